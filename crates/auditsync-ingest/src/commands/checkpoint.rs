//! `auditsync checkpoint` command implementation

use crate::checkpoint::{Checkpoint, Phase};
use crate::config::ConnectorConfig;
use crate::connector::Connector;
use crate::error::Result;
use auditsync_common::time::format_rfc3339;
use colored::Colorize;

/// Print the checkpoint stored for `source`
pub async fn show(config: ConnectorConfig, source: &str) -> Result<()> {
    let connector = Connector::open(config)?;

    match connector.checkpoints().get(source).await? {
        Some(checkpoint) => {
            for line in describe(&checkpoint) {
                println!("{}", line);
            }
        },
        None => {
            println!("No checkpoint stored for '{}'.", source);
            println!("The first tick will start a backfill.");
        },
    }

    Ok(())
}

fn describe(checkpoint: &Checkpoint) -> Vec<String> {
    let boundary = |value: Option<i64>| match value {
        Some(ms) => format!("{} ({})", format_rfc3339(ms), ms),
        None => "-".to_string(),
    };

    let phase = match checkpoint.phase() {
        Phase::Backfilling { .. } => "backfilling".yellow().to_string(),
        Phase::CatchingUp { .. } => "catching up".green().to_string(),
    };

    let mut lines = vec![
        format!("{}", checkpoint.key.cyan().bold()),
        format!("  Phase:            {}", phase),
        format!("  First event time: {}", boundary(checkpoint.first_event_time)),
        format!("  Last event time:  {}", boundary(checkpoint.last_event_time)),
    ];
    if matches!(checkpoint.phase(), Phase::Backfilling { .. }) {
        lines.push(format!(
            "  Backfill ceiling: {}",
            boundary(checkpoint.backfill_ceiling)
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_catching_up() {
        colored::control::set_override(false);

        let mut checkpoint = Checkpoint::new("audit");
        checkpoint.first_event_time = Some(1_704_067_200_000);
        checkpoint.last_event_time = Some(1_704_153_600_000);

        let lines = describe(&checkpoint);
        assert_eq!(lines[0], "audit");
        assert!(lines[1].ends_with("catching up"));
        assert!(lines[2].contains("2024-01-01T00:00:00"));
        assert!(lines[3].contains("1704153600000"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_describe_resumable_backfill() {
        colored::control::set_override(false);

        let mut checkpoint = Checkpoint::new("audit");
        checkpoint.first_event_time = Some(1_704_067_200_000);
        checkpoint.backfill_ceiling = Some(1_704_153_600_000);

        let lines = describe(&checkpoint);
        assert!(lines[1].ends_with("backfilling"));
        assert!(lines[4].contains("1704153600000"));
    }

    #[test]
    fn test_describe_fresh_backfill() {
        colored::control::set_override(false);

        let lines = describe(&Checkpoint::new("audit"));
        assert!(lines[1].ends_with("backfilling"));
        assert!(lines[2].ends_with("-"));
    }
}
