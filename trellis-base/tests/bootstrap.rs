use std::sync::Arc;
use std::time::Duration;

use trellis::{ApplicationContext, ComponentDescriptor, ContainerError};
use trellis_base::{BundleExt, Config, ConfigSection, Tracing, bootstrap};

#[derive(Debug, serde::Deserialize)]
struct GreeterConfig {
    greeting: String,
}

impl ConfigSection for GreeterConfig {
    fn key() -> &'static str {
        "greeter"
    }
}

struct Greeter {
    greeting: String,
}

fn greeter() -> Result<ComponentDescriptor, ContainerError> {
    ComponentDescriptor::builder::<Greeter>()
        .depends_on::<Config>("config")
        .construct(|args| {
            let config = args.required::<Config>("config")?;
            let section = config
                .section::<GreeterConfig>()?
                .ok_or("missing greeter section")?;
            Ok(Greeter {
                greeting: section.greeting,
            })
        })
        .build()
}

#[tokio::test]
async fn test_bootstrap_without_sections() {
    let context = bootstrap(&Config::new()).unwrap();
    assert_eq!(context.config().slow_construction_threshold, Duration::from_millis(100));
    assert!(context.config().metrics);
    assert!(context.contains::<Config>());
    assert!(!context.contains::<Tracing>());
}

#[tokio::test]
async fn test_bootstrap_applies_container_section() {
    let config = Config::parse(
        r#"{"container": {"slow_construction_threshold": "5s", "metrics": false}}"#,
    )
    .unwrap();
    let context = bootstrap(&config).unwrap();
    assert_eq!(context.config().slow_construction_threshold, Duration::from_secs(5));
    assert!(!context.config().metrics);

    context.get::<Config>().unwrap();
    assert_eq!(context.stats().constructions, 0);
    assert!(context.component_stats().is_empty());
}

#[tokio::test]
async fn test_components_read_config_sections() {
    let config = Config::parse(r#"{"greeter": {"greeting": "hello"}}"#).unwrap();
    let context = bootstrap(&config).unwrap();
    context.register(greeter().unwrap()).unwrap();

    let greeter = context.get::<Greeter>().unwrap();
    assert_eq!(greeter.greeting, "hello");
    assert!(Arc::ptr_eq(&greeter, &context.get::<Greeter>().unwrap()));
}

#[tokio::test]
async fn test_missing_section_fails_construction() {
    let context = bootstrap(&Config::new()).unwrap();
    context.register(greeter().unwrap()).unwrap();

    let err = context.get::<Greeter>().map(|_| ()).unwrap_err();
    assert!(matches!(err, ContainerError::ConstructionFailed { .. }));
    assert!(err.to_string().contains("missing greeter section"));
}

#[tokio::test]
async fn test_bundles_register_in_order() {
    struct First;
    struct Second;

    let context = ApplicationContext::new();
    context
        .add_bundle("first", |context| {
            context.register(
                ComponentDescriptor::builder::<First>()
                    .construct(|_| Ok(First))
                    .build()?,
            )?;
            Ok(())
        })
        .unwrap()
        .add_bundle("second", |context| {
            context.register(
                ComponentDescriptor::builder::<Second>()
                    .depends_on::<First>("first")
                    .construct(|_| Ok(Second))
                    .build()?,
            )?;
            Ok(())
        })
        .unwrap();

    let names: Vec<_> = context.components().iter().map(|c| c.name()).collect();
    assert_eq!(names.len(), 2);
    assert!(names[0].ends_with("First"));
    assert!(names[1].ends_with("Second"));
    assert!(context.get::<Second>().is_ok());
}

#[tokio::test]
async fn test_bundle_errors_propagate() {
    struct Primary;

    let descriptor = || {
        ComponentDescriptor::builder::<Primary>()
            .primary(true)
            .construct(|_| Ok(Primary))
            .build()
    };
    let context = ApplicationContext::new();
    let result = context.add_bundle("primaries", |context| {
        context.register(descriptor()?)?;
        context.register(descriptor()?)?;
        Ok(())
    });
    assert!(matches!(
        result,
        Err(ContainerError::AmbiguousPrimary { .. })
    ));
    assert_eq!(context.stats().registered_components, 1);
}

#[tokio::test]
async fn test_bootstrap_installs_tracing_once() {
    let config = Config::parse(r#"{"tracing": {"level": "debug"}}"#).unwrap();
    let context = bootstrap(&config).unwrap();

    let tracing = context.get::<Tracing>().unwrap();
    tracing.set_level(Some("trace")).unwrap();
    tracing.set_level(None).unwrap();
    assert!(tracing.set_level(Some("loud")).is_err());

    // The global subscriber is already installed.
    assert!(Tracing::init(&config).is_err());
}
