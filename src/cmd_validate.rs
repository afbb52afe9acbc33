//! Config validation and cron preview commands.

use chrono::{DateTime, Utc};

use cronhands_config::{Config, ConfigValidator, ValidationError};
use cronhands_core::{next_fire_after, parse_cron};

/// Validate a config and print the next fire time of each job.
pub(crate) fn validate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut result = ConfigValidator::validate(config)?;

    for (index, job) in config.jobs.iter().enumerate() {
        if let Err(e) = parse_cron(&job.cron) {
            result.add_error(ValidationError::new(
                format!("jobs[{}].cron", index),
                e.to_string(),
            ));
        }
    }

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for err in &result.errors {
        println!("error: {}: {}", err.path, err.message);
    }

    if !result.is_valid() {
        return Err(format!("{} error(s) found", result.errors.len()).into());
    }

    let now = Utc::now();
    println!("Configuration is valid ({} job(s))", config.jobs.len());
    for job in &config.jobs {
        let schedule = parse_cron(&job.cron)?;
        match next_fire_after(&schedule, now) {
            Some(at) => println!("  {:<24} {}", job.name, at.to_rfc3339()),
            None => println!("  {:<24} never", job.name),
        }
    }

    Ok(())
}

/// Print the next `count` fire times of a cron expression.
pub(crate) fn preview(cron: &str, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    for at in upcoming(cron, Utc::now(), count)? {
        println!("{}", at.to_rfc3339());
    }
    Ok(())
}

fn upcoming(
    cron: &str,
    after: DateTime<Utc>,
    count: usize,
) -> Result<Vec<DateTime<Utc>>, cronhands_core::SchedulerError> {
    let schedule = parse_cron(cron)?;
    Ok(schedule.after(&after).take(count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cronhands_config::JobConfig;

    #[test]
    fn test_upcoming_weekdays() {
        // 2030-01-04 is a Friday.
        let after = Utc.with_ymd_and_hms(2030, 1, 4, 10, 0, 0).unwrap();
        let times = upcoming("0 0 9 * * MON-FRI", after, 2).unwrap();
        assert_eq!(
            times,
            vec![
                Utc.with_ymd_and_hms(2030, 1, 7, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2030, 1, 8, 9, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_upcoming_rejects_bad_cron() {
        assert!(upcoming("* * *", Utc::now(), 3).is_err());
    }

    #[test]
    fn test_validate_flags_unparseable_cron() {
        let config = Config {
            jobs: vec![JobConfig {
                name: "broken".to_string(),
                cron: "0 0 25 * * *".to_string(),
                priority: None,
                command: "true".to_string(),
            }],
            ..Default::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_accepts_good_config() {
        let config = Config {
            jobs: vec![JobConfig {
                name: "report".to_string(),
                cron: "0 0 9 * * MON-FRI".to_string(),
                priority: Some(7),
                command: "report.sh".to_string(),
            }],
            ..Default::default()
        };
        assert!(validate(&config).is_ok());
    }
}
