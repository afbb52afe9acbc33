use super::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.scheduler.pool_size, 10);
    assert_eq!(config.history.backend, "memory");
    assert_eq!(config.logging.level, "info");
    assert!(config.jobs.is_empty());
}

#[test]
fn test_scheduler_config_default() {
    let scheduler = SchedulerConfig::default();
    assert_eq!(scheduler.default_priority, DEFAULT_JOB_PRIORITY);
    assert_eq!(scheduler.idle_wait_secs, 60);
    assert!(scheduler.log_command_output);
}

#[test]
fn test_scheduler_config_with_pool_size() {
    let scheduler = SchedulerConfig::with_pool_size(1);
    assert_eq!(scheduler.pool_size, 1);
    assert_eq!(scheduler.default_priority, 5);
}

#[test]
fn test_history_config_deserialize() {
    let history: HistoryConfig = toml::from_str(
        r#"
            backend = "sqlite"
            path = "/var/lib/cronhands/history.db"
        "#,
    )
    .unwrap();
    assert_eq!(history.backend, "sqlite");
    assert!(history.path.is_some());
}

#[test]
fn test_job_config_roundtrip_json() {
    let job = JobConfig {
        name: "backup".to_string(),
        cron: "0 0 3 * * ?".to_string(),
        priority: Some(8),
        command: "backup.sh".to_string(),
    };
    let json = serde_json::to_string(&job).unwrap();
    let parsed: JobConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.name, "backup");
    assert_eq!(parsed.priority, Some(8));
}

#[test]
fn test_job_config_missing_command_rejected() {
    let result: Result<JobConfig, _> = toml::from_str(
        r#"
            name = "broken"
            cron = "* * * * * *"
        "#,
    );
    assert!(result.is_err());
}
