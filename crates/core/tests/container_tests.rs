//! Resolution, registration and proxying through the public container API.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use sprout_core::container::{Invocation, Next, ProxyPredicate};
use sprout_core::{
    Bean, Candidate, Container, CoreError, CoreResult, Definition, DefinitionKind, Instance,
    Interceptor, Invocable, ProxyReason, TypeCatalog, TypeMetadata, TypeRef, Value,
};

use common::{init_tracing, Journal};

struct Greeter {
    greeting: String,
}

impl Bean for Greeter {
    fn invocable(&self) -> Option<&dyn Invocable> {
        Some(self)
    }
}

impl Invocable for Greeter {
    fn invoke(&self, method: &str, args: &[Value]) -> CoreResult<Value> {
        match method {
            "greet" => {
                let name = args.first().and_then(Value::as_str).unwrap_or("world");
                Ok(json!(format!("{}, {}!", self.greeting, name)))
            }
            other => Err(CoreError::MethodNotFound {
                id: "Greeter".to_string(),
                method: other.to_string(),
            }),
        }
    }
}

fn greeter_type(name: &str) -> TypeRef {
    TypeRef::concrete(name, |context| {
        let greeting = context
            .arg(0)
            .and_then(Value::as_str)
            .unwrap_or("Hello")
            .to_string();
        Ok(Instance::new(Greeter { greeting }))
    })
}

fn container_with(catalog: TypeCatalog) -> Container {
    init_tracing();
    Container::builder()
        .with_metadata(Arc::new(catalog))
        .build()
        .unwrap()
}

#[test]
fn test_alias_round_trip() {
    let container = container_with(TypeCatalog::new());
    let definition = Definition::builder("greeter", greeter_type("Greeter"))
        .aliases(["welcomer", "host"])
        .freeze();
    container.register(definition.clone(), true).unwrap();

    for name in ["greeter", "welcomer", "host"] {
        assert!(Arc::ptr_eq(&container.resolve(name).unwrap(), &definition));
    }
    let by_alias = container.get_instance("host", &[]).unwrap();
    let by_id = container.get_instance("greeter", &[]).unwrap();
    assert!(by_alias.ptr_eq(&by_id));
}

#[test]
fn test_registration_conflicts() {
    let container = container_with(TypeCatalog::new());
    let first = Definition::builder("greeter", greeter_type("Greeter")).freeze();
    container.register(first.clone(), true).unwrap();

    let error = container
        .register(Definition::builder("greeter", greeter_type("Greeter")).alias("other"), true)
        .unwrap_err();
    assert!(error.is_already_exists());
    assert!(container.resolve("other").is_none());

    let kept = container
        .register(Definition::builder("greeter", greeter_type("Greeter")), false)
        .unwrap();
    assert!(Arc::ptr_eq(&kept, &first));
}

#[test]
fn test_resolution_prefers_auto_implementations_over_configuration() {
    let catalog = TypeCatalog::new()
        .with_type(
            TypeRef::interface("Salutation"),
            TypeMetadata::new()
                .auto_implement(Candidate::Name("AbstractGreeter".to_string()))
                .auto_implement_type(greeter_type("Greeter")),
        )
        .with_type(
            TypeRef::abstract_type("AbstractGreeter"),
            TypeMetadata::new().extends("Salutation"),
        )
        .with_type(greeter_type("Greeter"), TypeMetadata::new().extends("Salutation"))
        .with_type(
            greeter_type("FormalGreeter"),
            TypeMetadata::new().extends("Salutation").configuration_candidate(0),
        );
    let container = container_with(catalog);

    let definition = container.resolve("Salutation").unwrap();
    assert_eq!(definition.kind(), DefinitionKind::DelegatingAutoImpl);
    assert_eq!(definition.delegate_id(), Some("Greeter"));

    // the delegating definition hands out the implementation's own singleton
    let via_interface = container.get_instance("Salutation", &[]).unwrap();
    let direct = container.get_instance("Greeter", &[]).unwrap();
    assert!(via_interface.ptr_eq(&direct));
    assert!(container.is_singleton("Salutation"));
}

#[test]
fn test_lookup_by_type() {
    let greeter = greeter_type("Greeter");
    let container = container_with(TypeCatalog::new().with_type(greeter.clone(), TypeMetadata::new()));

    assert!(container.is_instance(&greeter));
    let instance = container.get_instance(&greeter, &[]).unwrap();
    assert!(instance.downcast::<Greeter>().is_some());
    assert!(!container.is_instance(TypeRef::interface("Nothing")));
}

#[test]
fn test_non_singleton_instances_are_isolated() {
    let catalog = TypeCatalog::new().with_type(greeter_type("Greeter"), TypeMetadata::new().singleton(false));
    let container = container_with(catalog);

    let hello = container.get_instance("Greeter", &[json!("Hello")]).unwrap();
    let hi = container.get_instance("Greeter", &[json!("Hi")]).unwrap();

    assert!(!hello.ptr_eq(&hi));
    assert_eq!(hello.downcast::<Greeter>().unwrap().greeting, "Hello");
    assert_eq!(hi.downcast::<Greeter>().unwrap().greeting, "Hi");
    assert_eq!(container.singleton_count(), 0);
}

#[test]
fn test_prebound_definition_rejects_explicit_args() {
    let container = container_with(TypeCatalog::new());
    container
        .register(
            Definition::prebound("greeter", Instance::new(Greeter { greeting: "Hey".to_string() })),
            true,
        )
        .unwrap();

    assert!(container.get_instance("greeter", &[]).is_ok());
    let error = container.get_instance("greeter", &[json!(1)]).unwrap_err();
    assert!(matches!(error, CoreError::UnsupportedConstruction { ref id, arg_count: 1 } if id == "greeter"));
}

#[test]
fn test_construction_failure_is_tagged_and_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let flaky = TypeRef::concrete("Flaky", move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err("connection refused".into());
        }
        Ok(Instance::new(Greeter { greeting: "Back".to_string() }))
    });
    let container = container_with(TypeCatalog::new().with_type(flaky, TypeMetadata::new()));

    let error = container.get_instance("Flaky", &[]).unwrap_err();
    assert!(error.is_construction());
    assert!(matches!(error, CoreError::ConstructionFailed { ref id, .. } if id == "Flaky"));
    assert_eq!(container.singleton_count(), 0);

    assert!(container.get_instance("Flaky", &[]).is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_constructor_requesting_itself_is_a_cycle() {
    let selfish = TypeRef::concrete("Selfish", |context| {
        context.container().get_instance("Selfish", &[])?;
        Ok(Instance::new(Greeter { greeting: String::new() }))
    });
    let container = container_with(TypeCatalog::new().with_type(selfish, TypeMetadata::new()));

    let error = container.get_instance("Selfish", &[]).unwrap_err();
    assert!(error.is_construction());
    assert!(error.to_string().contains("Circular dependency"));
}

#[test]
fn test_delegation_cycle_is_reported() {
    init_tracing();
    let container = Container::builder()
        .with_definition(Definition::delegating("Left", TypeRef::interface("Left"), "Right"))
        .with_definition(Definition::delegating("Right", TypeRef::interface("Right"), "Left"))
        .with_definition(Definition::delegating("Mirror", TypeRef::interface("Mirror"), "Mirror"))
        .build()
        .unwrap();

    let error = container.get_instance("Left", &[]).unwrap_err();
    assert!(matches!(
        error,
        CoreError::CircularDependency { ref path, ref id } if path == "Left -> Right -> Left" && id == "Left"
    ));
    let error = container.get_instance("Mirror", &[]).unwrap_err();
    assert!(matches!(error, CoreError::CircularDependency { ref id, .. } if id == "Mirror"));
}

#[test]
fn test_delegate_to_missing_definition_is_not_found() {
    let container = container_with(TypeCatalog::new());
    container
        .register(Definition::delegating("Cache", TypeRef::interface("Cache"), "RedisCache"), true)
        .unwrap();

    let error = container.get_instance("Cache", &[]).unwrap_err();
    assert!(error.is_not_found());
}

struct Tagging {
    tag: &'static str,
    journal: Journal,
}

impl Interceptor for Tagging {
    fn name(&self) -> &str {
        self.tag
    }

    fn intercept(&self, invocation: &Invocation<'_>, next: Next<'_>) -> CoreResult<Value> {
        self.journal.push(format!("{}:{}", self.tag, invocation.method));
        next.proceed(invocation)
    }
}

#[test]
fn test_service_types_are_proxied_with_interceptors_in_order() {
    init_tracing();
    let journal = Journal::default();
    let catalog = TypeCatalog::new().with_type(greeter_type("Greeter"), TypeMetadata::new().service());
    let container = Container::builder()
        .with_metadata(Arc::new(catalog))
        .with_interceptor(Arc::new(Tagging { tag: "audit", journal: journal.clone() }))
        .with_interceptor(Arc::new(Tagging { tag: "timing", journal: journal.clone() }))
        .build()
        .unwrap();

    let instance = container.get_instance("Greeter", &[]).unwrap();
    let proxy = instance.proxy().unwrap();
    assert_eq!(proxy.chain_names(), vec!["lifecycle", "audit", "timing"]);

    let invocable = instance.bean().invocable().unwrap();
    assert_eq!(invocable.invoke("greet", &[json!("Ada")]).unwrap(), json!("Hello, Ada!"));
    assert_eq!(journal.entries(), vec!["audit:greet", "timing:greet"]);

    container.destroy().unwrap();
    let error = invocable.invoke("greet", &[]).unwrap_err();
    assert!(matches!(error, CoreError::InstanceDestroyed { .. }));
}

#[test]
fn test_final_type_is_never_proxied() {
    struct Everything;

    impl ProxyPredicate for Everything {
        fn name(&self) -> &str {
            "everything"
        }

        fn enables(&self, _ty: &TypeRef, _metadata: &TypeMetadata) -> bool {
            true
        }
    }

    let catalog = TypeCatalog::new().with_type(
        greeter_type("SealedGreeter"),
        TypeMetadata::new().sealed().service().proxy_override(true),
    );
    let container = Container::builder()
        .with_metadata(Arc::new(catalog))
        .with_proxy_predicate(Arc::new(Everything))
        .with_config(sprout_core::ContainerConfig::new().with_proxy_fallback(true))
        .build()
        .unwrap();

    let definition = container.resolve("SealedGreeter").unwrap();
    assert_eq!(definition.proxy_decision().reason, ProxyReason::Final);
    assert!(!container.get_instance("SealedGreeter", &[]).unwrap().is_proxy());
}

#[test]
fn test_proxy_fallback_flag() {
    let catalog = TypeCatalog::new().with_type(greeter_type("Greeter"), TypeMetadata::new());

    let without = container_with(catalog.clone());
    assert!(!without.get_instance("Greeter", &[]).unwrap().is_proxy());

    let with = Container::builder()
        .with_metadata(Arc::new(catalog))
        .with_config(sprout_core::ContainerConfig::new().with_proxy_fallback(true))
        .build()
        .unwrap();
    let definition = with.resolve("Greeter").unwrap();
    assert_eq!(definition.proxy_decision().reason, ProxyReason::Fallback);
    assert!(with.get_instance("Greeter", &[]).unwrap().is_proxy());
}
