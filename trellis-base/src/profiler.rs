use std::time::Duration;

use trellis::{ApplicationContext, Dependency};

/// Text reports about an [`ApplicationContext`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use trellis::{ApplicationContext, ComponentDescriptor};
/// use trellis_base::Profiler;
///
/// struct Clock;
///
/// let context = ApplicationContext::new();
/// context
///     .register(ComponentDescriptor::builder::<Clock>().construct(|_| Ok(Clock)).build().unwrap())
///     .unwrap();
///
/// let profiler = Profiler::new(&context);
/// assert!(profiler.validation_report().contains("validation passed"));
/// assert!(profiler.dependency_graph().contains("Clock"));
/// ```
pub struct Profiler<'a> {
    context: &'a ApplicationContext,
}

impl<'a> Profiler<'a> {
    pub fn new(context: &'a ApplicationContext) -> Self {
        Self { context }
    }

    /// Construction counts and average construction times, slowest first.
    pub fn metrics_report(&self) -> String {
        let stats = self.context.stats();
        let mut lines = vec!["Container metrics".to_string(), "=".repeat(50)];
        lines.extend(self.context.component_stats().into_iter().map(|component| {
            format!(
                "{:<40} created: {:>4} avg: {:>9} total: {:>9}",
                component.component.name(),
                component.constructions,
                format_duration(component.average_time()),
                format_duration(component.total_time),
            )
        }));
        lines.push(format!(
            "registered: {}, singletons: {}, constructions: {}, errors: {}",
            stats.registered_components,
            stats.active_singletons,
            stats.constructions,
            stats.resolution_errors,
        ));
        join_lines(lines)
    }

    /// Result of [`ApplicationContext::validate`], one problem per line.
    pub fn validation_report(&self) -> String {
        match self.context.validate() {
            Ok(()) => "Container validation passed\n".to_string(),
            Err(errors) => {
                let mut lines = vec!["Container validation found problems:".to_string()];
                lines.extend(errors.iter().map(|error| format!("  - {error}")));
                join_lines(lines)
            }
        }
    }

    /// Every component with its constructor and field dependencies.
    pub fn dependency_graph(&self) -> String {
        let mut lines = vec!["Dependency graph".to_string(), "=".repeat(30)];
        for descriptor in self.context.components() {
            lines.push(format!(
                "{} ({}, {})",
                descriptor.name(),
                descriptor.scope(),
                descriptor.stereotype()
            ));
            for dependency in descriptor.dependencies() {
                lines.push(format!("  └─ {}", format_dependency(dependency, "")));
            }
            for dependency in descriptor.field_dependencies() {
                lines.push(format!("  └─ {}", format_dependency(dependency, "field ")));
            }
        }
        join_lines(lines)
    }
}

fn join_lines(lines: Vec<String>) -> String {
    let mut report = lines.join("\n");
    report.push('\n');
    report
}

fn format_dependency(dependency: &Dependency, kind: &str) -> String {
    let optional = if dependency.is_optional() { "?" } else { "" };
    format!(
        "{kind}{}: {}{optional}",
        dependency.name(),
        dependency.capability()
    )
}

fn format_duration(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}
