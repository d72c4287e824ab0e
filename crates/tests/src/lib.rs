//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约测试：作业计划到配置的编码
//! - 端到端测试：加载计划 -> 校验 -> 推测执行 -> 逐存储提交

#[cfg(test)]
mod contract_tests {
    use contracts::{
        decode_store_list, FuncSpec, JobPlan, JobSettings, PlanVersion, StoreDescriptor, StoreRole,
        MAP_STORES_KEY, REDUCE_STORES_KEY,
    };

    #[test]
    fn test_plan_encodes_both_store_lists() {
        let plan = JobPlan {
            version: PlanVersion::V1,
            job: JobSettings {
                name: "wc".into(),
                tasks: 1,
                speculative_attempts: 1,
                properties: Default::default(),
            },
            stores: vec![StoreDescriptor::new(
                "words",
                FuncSpec::new("text"),
                "/out/words",
                StoreRole::Map,
            )],
        };

        let conf = plan.to_configuration().unwrap();
        let map = decode_store_list(MAP_STORES_KEY, conf.get(MAP_STORES_KEY).unwrap()).unwrap();
        let reduce =
            decode_store_list(REDUCE_STORES_KEY, conf.get(REDUCE_STORES_KEY).unwrap()).unwrap();

        assert_eq!(map, plan.stores);
        assert!(reduce.is_empty());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::staging::{SUCCESS_MARKER, TEMPORARY_DIR};
    use contracts::{
        FuncSpec, JobContext, JobPlan, JobSettings, PlanVersion, StoreDescriptor, StoreRole,
        TaskAttemptContext, TaskId, TaskKind, Tuple,
    };
    use dispatcher::{AuthorityState, CommitCoordinator, Mode, OutputError, StoreOutputFormat};

    fn plan_toml(out: &Path) -> String {
        format!(
            r#"
[job]
name = "wordcount"
tasks = 1
speculative_attempts = 2

[[stores]]
name = "words"
location = "{words}"
role = "map"
[stores.func]
kind = "text"
params = {{ delimiter = "," }}

[[stores]]
name = "counts"
location = "{counts}"
role = "reduce"
[stores.func]
kind = "json"
params = {{ fields = "word,count" }}
"#,
            words = out.join("words").display(),
            counts = out.join("counts").display(),
        )
    }

    fn job_for(toml: &str) -> JobContext {
        let plan = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        JobContext::new("job_e2e".into(), plan.to_configuration().unwrap())
    }

    fn format() -> StoreOutputFormat {
        StoreOutputFormat::new(Arc::new(stores::builtin_catalog().unwrap()))
    }

    fn records() -> Vec<Tuple> {
        ["apple\t3", "banana\t5"]
            .iter()
            .map(|line| Tuple::parse_line(line, '\t'))
            .collect()
    }

    /// Write every record through a session and hand back the pending authorities
    fn run_attempt(
        format: &StoreOutputFormat,
        mut ctx: TaskAttemptContext,
        records: &[Tuple],
    ) -> Result<CommitCoordinator, OutputError> {
        let mut coordinator = format.output_committer(&ctx)?;
        coordinator.setup_task()?;

        let writer = format.record_writer(&mut ctx)?;
        assert_eq!(writer.mode(), Mode::Multi);
        writer.close(&ctx)?;

        let mut session = format.open_session(&ctx)?;
        for record in records {
            session.write_all(record)?;
        }
        session.close()?;
        Ok(coordinator)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// 两个推测尝试并发写入两个存储，只提交胜出者
    #[tokio::test]
    async fn test_speculative_attempts_commit_winner_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let job = job_for(&plan_toml(&out));
        let format = format();

        format.check_output_specs(&job).unwrap();
        CommitCoordinator::for_job(&job, TaskKind::JobSetup, format.catalog())
            .unwrap()
            .setup_job()
            .unwrap();

        let records = Arc::new(records());
        let mut handles = Vec::new();
        for ordinal in 0..2 {
            let ctx = TaskAttemptContext::for_job(&job, TaskId::map(0), ordinal);
            let format = format.clone();
            let records = Arc::clone(&records);
            handles.push(tokio::task::spawn_blocking(move || {
                run_attempt(&format, ctx, &records)
            }));
        }
        let mut attempts = Vec::new();
        for handle in handles {
            attempts.push(handle.await.unwrap().unwrap());
        }

        // both attempts staged privately, nothing visible yet
        for store in ["words", "counts"] {
            let staged = entries(&out.join(store).join(TEMPORARY_DIR));
            assert_eq!(staged.len(), 2, "{store}: {staged:?}");
            assert!(!out.join(store).join("part-m-00000").exists());
        }

        let mut loser = attempts.remove(0);
        let mut winner = attempts.remove(0);
        assert!(winner.needs_task_commit().unwrap());
        winner.commit_task().unwrap();
        loser.abort_task().unwrap();
        assert!(winner
            .authorities()
            .iter()
            .all(|a| a.state() == AuthorityState::Committed));

        CommitCoordinator::for_job(&job, TaskKind::JobCleanup, format.catalog())
            .unwrap()
            .commit_job()
            .unwrap();

        for store in ["words", "counts"] {
            assert_eq!(
                entries(&out.join(store)),
                vec![SUCCESS_MARKER, "part-m-00000"]
            );
        }
        assert_eq!(
            fs::read_to_string(out.join("words").join("part-m-00000")).unwrap(),
            "apple,3\nbanana,5\n"
        );
        let counts = fs::read_to_string(out.join("counts").join("part-m-00000")).unwrap();
        let first: serde_json::Value = serde_json::from_str(counts.lines().next().unwrap()).unwrap();
        assert_eq!(first["word"], "apple");
        assert_eq!(first["count"], 3);
    }

    /// 一个存储的作业准备失败不影响其他存储
    #[tokio::test]
    async fn test_failing_store_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        // a regular file where a directory is needed
        fs::write(out.join("blocked"), "x").unwrap();

        let toml = format!(
            r#"
[job]
name = "wc"

[[stores]]
name = "good"
location = "{good}"
[stores.func]
kind = "text"

[[stores]]
name = "bad"
location = "{bad}"
[stores.func]
kind = "text"
"#,
            good = out.join("good").display(),
            bad = out.join("blocked").join("bad").display(),
        );
        let job = job_for(&toml);
        let format = format();

        let err = CommitCoordinator::for_job(&job, TaskKind::JobSetup, format.catalog())
            .unwrap()
            .setup_job()
            .unwrap_err();

        assert!(matches!(err, OutputError::PerStore { .. }));
        assert_eq!(err.failed_stores(), vec!["bad"]);
        assert!(out.join("good").join(TEMPORARY_DIR).is_dir());
    }

    /// 单一存储走直通写入，无需会话
    #[tokio::test]
    async fn test_single_store_direct_writer() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("only");
        let toml = format!(
            r#"
[job]
name = "wc"

[[stores]]
name = "only"
location = "{}"
role = "reduce"
[stores.func]
kind = "text"
"#,
            out.display()
        );
        let job = job_for(&toml);
        let format = format();
        format.check_output_specs(&job).unwrap();

        let mut ctx = TaskAttemptContext::for_job(&job, TaskId::reduce(2), 0);
        let mut coordinator = format.output_committer(&ctx).unwrap();
        let mut writer = format.record_writer(&mut ctx).unwrap();
        assert_eq!(writer.mode(), Mode::Single);
        assert_eq!(coordinator.mode(), Some(Mode::Single));

        for record in records() {
            writer.write(None, &record).unwrap();
        }
        writer.close(&ctx).unwrap();
        coordinator.commit_task().unwrap();

        assert_eq!(
            fs::read_to_string(out.join("part-r-00002")).unwrap(),
            "apple\t3\nbanana\t5\n"
        );
    }

    /// 已存在的输出目录在提交作业前被拒绝，并指明存储名称
    #[test]
    fn test_existing_output_rejected_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("counts")).unwrap();

        let job = job_for(&plan_toml(&out));
        let err = format().check_output_specs(&job).unwrap_err();

        match err {
            OutputError::Validation { store, .. } => assert_eq!(store, "counts"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!out.join("words").exists());
    }

    /// 直接从计划构建作业上下文，跳过加载器校验
    fn job_from_stores(stores: Vec<StoreDescriptor>) -> JobContext {
        let plan = JobPlan {
            version: PlanVersion::V1,
            job: JobSettings {
                name: "wc".into(),
                tasks: 1,
                speculative_attempts: 1,
                properties: Default::default(),
            },
            stores,
        };
        JobContext::new("job_e2e".into(), plan.to_configuration().unwrap())
    }

    /// 两个存储共用同一输出目录时，加载器和提交前校验都拒绝第二个存储
    #[test]
    fn test_shared_location_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("shared");
        let stores = vec![
            StoreDescriptor::new(
                "a",
                FuncSpec::new("text"),
                shared.display().to_string(),
                StoreRole::Map,
            ),
            StoreDescriptor::new(
                "b",
                FuncSpec::new("json"),
                format!("{}/", shared.display()),
                StoreRole::Map,
            ),
        ];

        let toml = format!(
            r#"
[job]
name = "wc"

[[stores]]
name = "a"
location = "{shared}"
[stores.func]
kind = "text"

[[stores]]
name = "b"
location = "{shared}"
[stores.func]
kind = "json"
"#,
            shared = shared.display()
        );
        let err = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("stores[b].location"), "{err}");

        let job = job_from_stores(stores);
        let err = format().check_output_specs(&job).unwrap_err();
        match err {
            OutputError::Validation { store, role, .. } => {
                assert_eq!(store, "b");
                assert_eq!(role, StoreRole::Map);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!shared.exists());
    }

    /// 第二个存储的输出目录为空：由目录绑定失败，第一个存储的绑定不外泄
    #[test]
    fn test_invalid_location_isolated_to_its_store() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good");
        let job = job_from_stores(vec![
            StoreDescriptor::new(
                "good",
                FuncSpec::new("text"),
                good.display().to_string(),
                StoreRole::Map,
            ),
            StoreDescriptor::new("bad", FuncSpec::new("text"), "", StoreRole::Reduce),
        ]);
        let before = job.conf().clone();

        let err = format().check_output_specs(&job).unwrap_err();
        match &err {
            OutputError::Validation { store, role, source } => {
                assert_eq!(store, "bad");
                assert_eq!(*role, StoreRole::Reduce);
                assert!(
                    matches!(source, contracts::ContractError::OutputSpec { .. }),
                    "{source:?}"
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(err.failed_stores(), vec!["bad"]);
        assert_eq!(job.conf(), &before);
        assert!(job.conf().get(contracts::OUTPUT_DIR_KEY).is_none());
        assert!(!good.exists());
    }
}
