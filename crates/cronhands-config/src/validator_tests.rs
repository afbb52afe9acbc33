
    use super::*;
    use crate::schema::JobConfig;

    fn job(name: &str, cron: &str, command: &str) -> JobConfig {
        JobConfig {
            name: name.to_string(),
            cron: cron.to_string(),
            priority: None,
            command: command.to_string(),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_zero_pool_size() {
        let mut config = Config::default();
        config.scheduler.pool_size = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "scheduler.pool_size"));
    }

    #[test]
    fn test_validate_high_pool_size_warning() {
        let mut config = Config::default();
        config.scheduler.pool_size = 1000;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "scheduler.pool_size"));
    }

    #[test]
    fn test_validate_empty_shell() {
        let mut config = Config::default();
        config.scheduler.shell = "  ".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "scheduler.shell"));
    }

    #[test]
    fn test_validate_unknown_history_backend() {
        let mut config = Config::default();
        config.history.backend = "postgres".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "history.backend"));
    }

    #[test]
    fn test_validate_sqlite_without_path_warning() {
        let mut config = Config::default();
        config.history.backend = "sqlite".to_string();

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "history.path"));
    }

    #[test]
    fn test_validate_duplicate_job_names() {
        let mut config = Config::default();
        config.jobs.push(job("sync", "0 * * * * *", "sync.sh"));
        config.jobs.push(job("sync", "30 * * * * *", "sync.sh"));

        let result = ConfigValidator::validate(&config).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "jobs[1].name");
    }

    #[test]
    fn test_validate_empty_command_and_name() {
        let mut config = Config::default();
        config.jobs.push(job("", "0 * * * * *", " "));

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "jobs[0].name"));
        assert!(result.errors.iter().any(|e| e.path == "jobs[0].command"));
    }

    #[test]
    fn test_validate_cron_field_count() {
        let mut config = Config::default();
        config.jobs.push(job("five", "* * * * *", "true"));
        config.jobs.push(job("six", "0 * * * * *", "true"));
        config.jobs.push(job("seven", "0 0 0 1 JAN ? 2099", "true"));

        let result = ConfigValidator::validate(&config).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "jobs[0].cron");
    }
