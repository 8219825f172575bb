//! List command implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use netweave_fabric::{Container, ContainerManager};

pub fn execute(manager: &ContainerManager) -> Result<()> {
    tracing::debug!(state_dir = %manager.config().state_dir.display(), "Listing containers");

    let containers = manager.list().context("Failed to read container records")?;

    println!(
        "{:<14}{:<16}{:<24}{:<16}{:<8}{}",
        "CONTAINER ID", "NAME", "NAMESPACE", "BRIDGES", "VETHS", "CREATED"
    );

    let now = Utc::now();
    for container in &containers {
        println!("{}", row(container, now));
    }

    if containers.is_empty() {
        println!("No containers");
    }

    Ok(())
}

fn row(container: &Container, now: DateTime<Utc>) -> String {
    let namespace = container
        .namespace
        .as_ref()
        .map_or_else(|| "-".to_string(), |ns| ns.path.display().to_string());
    let bridges = if container.bridges.is_empty() {
        "-".to_string()
    } else {
        container
            .bridges
            .iter()
            .map(|b| b.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    };

    format!(
        "{:<14}{:<16}{:<24}{:<16}{:<8}{}",
        container.id.short(),
        container.name,
        namespace,
        bridges,
        container.veths.len(),
        humanize_age(now - container.created_at)
    )
}

/// Coarse age: `just now`, `5s`, `3m`, `2h`, `4d`, `1mo`, `2y`
fn humanize_age(age: chrono::TimeDelta) -> String {
    let secs = age.num_seconds();

    match secs {
        ..1 => "just now".to_string(),
        1..60 => format!("{secs}s"),
        60..3_600 => format!("{}m", secs / 60),
        3_600..86_400 => format!("{}h", secs / 3_600),
        86_400..2_592_000 => format!("{}d", secs / 86_400),
        2_592_000..31_536_000 => format!("{}mo", secs / 2_592_000),
        _ => format!("{}y", secs / 31_536_000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use netweave_core::ResourceName;

    #[test]
    fn test_humanize_age() {
        assert_eq!(humanize_age(TimeDelta::zero()), "just now");
        assert_eq!(humanize_age(TimeDelta::seconds(-3)), "just now");
        assert_eq!(humanize_age(TimeDelta::seconds(5)), "5s");
        assert_eq!(humanize_age(TimeDelta::minutes(3)), "3m");
        assert_eq!(humanize_age(TimeDelta::hours(2)), "2h");
        assert_eq!(humanize_age(TimeDelta::days(4)), "4d");
        assert_eq!(humanize_age(TimeDelta::days(45)), "1mo");
        assert_eq!(humanize_age(TimeDelta::days(800)), "2y");
    }

    #[test]
    fn test_row_without_namespace() {
        let container = Container::new(ResourceName::new("h1").unwrap());
        let line = row(&container, container.created_at);

        assert!(line.starts_with(container.id.short()));
        assert!(line.contains("h1"));
        assert!(line.ends_with("just now"));
        // No namespace, no bridges
        assert_eq!(line.split_whitespace().filter(|f| *f == "-").count(), 2);
    }
}
