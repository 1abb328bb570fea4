//! Run state machine: `CREATED -> PREPARED -> RUNNING -> {OK, ERROR}`.
//!
//! `prepare` allocates the run directory and stages files; `run` executes the
//! engine and records the outcome on the Execution. Once RUNNING, every exit
//! path sets `finished`, and run failures never surface as `Err`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use labflow_access::{can_edit, visible_executions, EntityRef};
use labflow_pipeline::command_line::{build_invocation, InvocationSpec};
use labflow_pipeline::dependency::{upstream_ids, DependencyGraph};
use labflow_pipeline::engine_log::{parse_process_rows, parse_run_identifier};
use labflow_pipeline::outputs::{collect_outputs, parse_output_schema};
use labflow_pipeline::params::{params_to_json, parse_params, Param, ParamKind};
use labflow_sqlite::db::{collection_ops, command_ops, execution_ops, link_ops, process_ops, sample_ops};
use labflow_sqlite::models::execution::{Execution, ExecutionStatus};
use labflow_sqlite::models::process_record::NewProcessRecord;
use labflow_sqlite::models::Parent;
use labflow_sqlite::{DbPool, ExecutionId};
use tracing::{debug, error, info, warn};

use crate::error::OrchError;
use crate::pipeline_engine::{read_process_output, PipelineEngine};
use crate::run_dir::{self, Upload};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Run directories live at `<executions_root>/<execution id>`.
    pub executions_root: PathBuf,
    /// Command scripts resolve against this directory.
    pub pipelines_root: PathBuf,
    /// Passed to the engine as `-C <engine_config>`.
    pub engine_config: PathBuf,
    pub run_timeout: Duration,
}

enum Verdict {
    Succeeded { terminal: String },
    Failed { terminal: String, reason: String },
}

#[derive(Clone)]
pub struct Orchestrator {
    pool: DbPool,
    engine: Arc<dyn PipelineEngine>,
    config: Arc<OrchestratorConfig>,
}

impl Orchestrator {
    pub fn new(pool: DbPool, engine: Arc<dyn PipelineEngine>, config: OrchestratorConfig) -> Self {
        Self {
            pool,
            engine,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn run_dir(&self, execution_id: ExecutionId) -> PathBuf {
        run_dir::run_dir(&self.config.executions_root, execution_id)
    }

    /// `CREATED -> PREPARED`. A failure marks the Execution ERROR and is
    /// returned as `PreparationFailure`.
    ///
    /// Staging runs under an immediate transaction, so a concurrent `prepare`
    /// of the same Execution waits for the write lock and then finds it no
    /// longer CREATED.
    pub fn prepare(&self, execution_id: ExecutionId, uploads: &[Upload]) -> Result<PathBuf, OrchError> {
        let mut conn = self.pool.get()?;
        let staged = conn.immediate_transaction::<_, OrchError, _>(|conn| {
            let execution = execution_ops::find_execution(conn, execution_id)?
                .ok_or(OrchError::NotFound(execution_id))?;
            if execution.status().ok() != Some(ExecutionStatus::Created) {
                return Err(not_created(&execution));
            }

            match self.stage(conn, &execution, uploads) {
                Ok(dir) => {
                    let moved = execution_ops::transition(
                        conn,
                        execution_id,
                        ExecutionStatus::Created,
                        ExecutionStatus::Prepared,
                    )?;
                    if moved == 0 {
                        return Err(not_created(&execution_ops::get_execution_by_id(conn, execution_id)?));
                    }
                    Ok(Ok(dir))
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    let failed = execution_ops::fail_if_status(
                        conn,
                        execution_id,
                        ExecutionStatus::Created,
                        &message,
                        labflow_sqlite::now(),
                    )?;
                    if failed == 0 {
                        return Err(not_created(&execution_ops::get_execution_by_id(conn, execution_id)?));
                    }
                    Ok(Err(message))
                }
            }
        })?;

        match staged {
            Ok(dir) => {
                info!(execution = execution_id, dir = %dir.display(), "CREATED -> PREPARED");
                Ok(dir)
            }
            Err(message) => {
                warn!(execution = execution_id, "preparation failed: {message}");
                Err(OrchError::PreparationFailure {
                    execution_id,
                    message,
                })
            }
        }
    }

    fn stage(&self, conn: &mut SqliteConnection, execution: &Execution, uploads: &[Upload]) -> anyhow::Result<PathBuf> {
        let command_id = execution.command_id.context("Execution has no command")?;
        let command = command_ops::find_command(conn, command_id)?
            .with_context(|| format!("Command {command_id} does not exist"))?;

        let dir = run_dir::allocate(&self.config.executions_root, execution.id)
            .with_context(|| format!("could not allocate run directory for Execution {}", execution.id))?;
        for upload in uploads {
            run_dir::stage_upload(&dir, upload)
                .with_context(|| format!("could not stage '{}'", upload.file_name))?;
        }
        run_dir::copy_script(&self.config.pipelines_root, &command.script, &dir)
            .with_context(|| format!("could not copy script '{}'", command.script))?;
        Ok(dir)
    }

    /// `PREPARED -> RUNNING -> {OK, ERROR}`. Returns the final row. Only
    /// infrastructure problems before the run starts come back as `Err`.
    pub async fn run(&self, execution_id: ExecutionId) -> Result<Execution, OrchError> {
        let mut conn = self.pool.get()?;
        let execution = execution_ops::find_execution(&mut conn, execution_id)?
            .ok_or(OrchError::NotFound(execution_id))?;
        if execution_ops::mark_running(&mut conn, execution_id, labflow_sqlite::now())? == 0 {
            return Err(OrchError::InvalidState {
                execution_id,
                status: execution.status,
                expected: ExecutionStatus::Prepared.as_str(),
            });
        }
        info!(execution = execution_id, "PREPARED -> RUNNING");
        let mut guard = FinishGuard::new(self.pool.clone(), execution_id);

        let dir = self.run_dir(execution_id);
        let (status, reason, terminal) = match self.execute(&mut conn, &execution, &dir).await {
            Ok(Verdict::Succeeded { terminal }) => (ExecutionStatus::Ok, String::new(), terminal),
            Ok(Verdict::Failed { terminal, reason }) => {
                warn!(execution = execution_id, "run failed: {reason}");
                (ExecutionStatus::Error, reason, terminal)
            }
            Err(e) => {
                warn!(execution = execution_id, "run aborted: {e:#}");
                let captured = execution_ops::get_execution_by_id(&mut conn, execution_id)?.terminal;
                let trace = if captured.is_empty() {
                    format!("{e:?}")
                } else {
                    format!("{captured}\n{e:?}")
                };
                (ExecutionStatus::Error, format!("{e:#}"), trace)
            }
        };

        execution_ops::finish(&mut conn, execution_id, status, &reason, &terminal, labflow_sqlite::now())?;
        guard.disarm();
        info!(execution = execution_id, "RUNNING -> {status}");
        Ok(execution_ops::get_execution_by_id(&mut conn, execution_id)?)
    }

    async fn execute(&self, conn: &mut SqliteConnection, execution: &Execution, dir: &Path) -> anyhow::Result<Verdict> {
        let id = execution.id;
        let inputs = parse_params(&execution.input).context("input is not a valid parameter list")?;
        let upstream = self.attach_upstream(conn, execution, &inputs)?;

        let command_id = execution.command_id.context("Execution has no command")?;
        let command = command_ops::get_command_by_id(conn, command_id)?;
        let script = dir.join(
            Path::new(&command.script)
                .file_name()
                .with_context(|| format!("script '{}' has no file name", command.script))?,
        );

        let invocation = build_invocation(
            InvocationSpec {
                program: self.engine.program(),
                config: &self.config.engine_config,
                script: &script,
                run_dir: dir,
                executions_root: &self.config.executions_root,
            },
            &inputs,
            &upstream,
        )?;
        // file names are plain once build_invocation accepts them
        for input in inputs.iter().filter(|p| p.kind == ParamKind::File) {
            if let Some(name) = input.file_name() {
                if !dir.join(name).is_file() {
                    bail!("Input file '{name}' was not staged");
                }
            }
        }
        let command_line = invocation.display();
        execution_ops::set_command_line(conn, id, &command_line)?;
        debug!(execution = id, %command_line, "launching pipeline engine");

        let output = self.engine.launch(&invocation, self.config.run_timeout).await?;
        execution_ops::set_terminal(conn, id, &output.transcript)?;

        let mut failure = match parse_run_identifier(&output.transcript) {
            None => Some("Could not find a run identifier in the engine output".to_string()),
            Some(identifier) => {
                execution_ops::set_identifier(conn, id, &identifier)?;
                self.record_processes(conn, id, dir, &identifier).await?
            }
        };
        if failure.is_none() && !output.success() {
            failure = Some(match output.exit_code {
                Some(code) => format!("Engine exited with status {code}"),
                None => "Engine was terminated by a signal".to_string(),
            });
        }
        // failure is final: no output collection, no later OK
        if let Some(reason) = failure {
            return Ok(Verdict::Failed {
                terminal: output.transcript,
                reason,
            });
        }

        let specs = parse_output_schema(&command.outputs)?;
        let stdouts: Vec<String> = process_ops::list_for_execution(conn, id)?
            .into_iter()
            .map(|p| p.stdout)
            .collect();
        let outputs = collect_outputs(dir, &specs, &stdouts)?;
        execution_ops::set_output(conn, id, &params_to_json(&outputs)?)?;
        debug!(execution = id, outputs = outputs.len(), "collected outputs");
        Ok(Verdict::Succeeded {
            terminal: output.transcript,
        })
    }

    /// Records upstream edges for `data` inputs and returns each upstream's
    /// parsed output list.
    ///
    /// Upstreams are resolved as the Execution's owner sees them: one the
    /// owner cannot view counts as unknown. A parent is inherited only when
    /// the owner may edit it.
    fn attach_upstream(
        &self,
        conn: &mut SqliteConnection,
        execution: &Execution,
        inputs: &[Param],
    ) -> anyhow::Result<HashMap<ExecutionId, Vec<Param>>> {
        let ids = upstream_ids(inputs);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let owner = link_ops::execution_owner_ids(conn, execution.id)?.into_iter().next();
        let visible = visible_executions(conn, owner, &ids)?;
        let upstream: Vec<Execution> = execution_ops::list_executions(conn, &ids)?
            .into_iter()
            .filter(|e| visible.contains(&e.id))
            .collect();
        let known: HashSet<ExecutionId> = upstream.iter().map(|e| e.id).collect();

        let mut graph = DependencyGraph::from_edges(
            execution_ops::ancestor_edges(conn, &ids)?
                .into_iter()
                .map(|edge| (edge.upstream_id, edge.downstream_id)),
        );
        graph.attach(execution.id, &ids, |id| known.contains(&id))?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            for upstream_id in &ids {
                execution_ops::add_upstream(conn, *upstream_id, execution.id)?;
            }
            Ok(())
        })?;
        debug!(execution = execution.id, upstream = ?ids, "attached upstream executions");

        let by_id: HashMap<ExecutionId, &Execution> = upstream.iter().map(|e| (e.id, e)).collect();
        if execution.parent() == Parent::None {
            let donor = ids
                .iter()
                .filter_map(|id| by_id.get(id))
                .find(|e| e.parent() != Parent::None);
            if let Some(donor) = donor {
                let editable = match EntityRef::from_parent(donor.parent()) {
                    Some(parent) => can_edit(conn, owner, parent)?,
                    None => false,
                };
                if editable {
                    inherit_parent(conn, execution.id, donor)?;
                } else {
                    debug!(execution = execution.id, donor = donor.id, "owner cannot edit upstream parent; not inherited");
                }
            }
        }

        upstream
            .iter()
            .map(|e| {
                let outputs = parse_params(&e.output)
                    .with_context(|| format!("output of Execution {} is not a valid parameter list", e.id))?;
                Ok((e.id, outputs))
            })
            .collect()
    }

    async fn record_processes(
        &self,
        conn: &mut SqliteConnection,
        execution_id: ExecutionId,
        dir: &Path,
        identifier: &str,
    ) -> anyhow::Result<Option<String>> {
        let log = self.engine.process_log(dir, identifier).await?;
        let mut failure = None;
        for row in parse_process_rows(&log) {
            let (stdout, stderr) = read_process_output(&row.work_dir).await;
            process_ops::create_process_record(
                conn,
                &NewProcessRecord {
                    execution_id,
                    name: &row.name,
                    status: &row.status,
                    work_dir: &row.work_dir.to_string_lossy(),
                    stdout: &stdout,
                    stderr: &stderr,
                    created: labflow_sqlite::now(),
                },
            )?;
            if row.is_failure() && failure.is_none() {
                failure = Some(format!("Process '{}' reported {}", row.name, row.status));
            }
        }
        Ok(failure)
    }
}

fn not_created(execution: &Execution) -> OrchError {
    OrchError::InvalidState {
        execution_id: execution.id,
        status: execution.status.clone(),
        expected: ExecutionStatus::Created.as_str(),
    }
}

/// Copies the donor's sample/collection onto the execution, together with the
/// new parent's privacy flag.
fn inherit_parent(conn: &mut SqliteConnection, execution_id: ExecutionId, donor: &Execution) -> anyhow::Result<()> {
    let private = match donor.parent() {
        Parent::Collection(cid) => collection_ops::get_collection_by_id(conn, cid)?.private,
        Parent::Sample(sid) => sample_ops::get_sample_by_id(conn, sid)?.private,
        Parent::None => return Ok(()),
    };
    execution_ops::set_parent(conn, execution_id, donor.sample_id, donor.collection_id, private)?;
    debug!(execution = execution_id, donor = donor.id, "inherited parent from upstream");
    Ok(())
}

/// Marks the Execution ERROR and sets `finished` if the run is dropped or
/// panics before recording its outcome.
struct FinishGuard {
    pool: DbPool,
    execution_id: ExecutionId,
    armed: bool,
}

impl FinishGuard {
    fn new(pool: DbPool, execution_id: ExecutionId) -> Self {
        Self {
            pool,
            execution_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let result = self.pool.get().map_err(anyhow::Error::from).and_then(|mut conn| {
            execution_ops::abandon_if_unfinished(
                &mut conn,
                self.execution_id,
                "Run was interrupted before it finished",
                labflow_sqlite::now(),
            )
            .map_err(anyhow::Error::from)
        });
        match result {
            Ok(0) => {}
            Ok(_) => warn!(execution = self.execution_id, "run interrupted; marked ERROR"),
            Err(e) => error!(execution = self.execution_id, "failed to record interrupted run: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use labflow_pipeline::Invocation;
    use labflow_sqlite::db::execution_ops::ExecutionDraft;
    use labflow_sqlite::db::user_ops;
    use labflow_sqlite::models::Permission;
    use labflow_sqlite::{establish_connection_pool, run_migrations, UserId};
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::pipeline_engine::EngineOutput;

    const TRANSCRIPT: &str = "N E X T F L O W  ~  version 23.10.0\nLaunching `count.nf` [tiny_turing] DSL2 - revision: 1a2b3c\n";
    const SCHEMA: &str = r#"[{"type":"file","name":"counts","match":"*.tsv"},{"type":"basic","name":"total","match":"COUNT:"}]"#;

    /// Replays a canned run: writes result files and per-step work
    /// directories, then reports the configured exit code.
    #[derive(Default)]
    struct ScriptedEngine {
        transcript: String,
        exit_code: Option<i32>,
        steps: Vec<(&'static str, &'static str, &'static str)>,
        produces: Vec<(&'static str, &'static str)>,
        hang: bool,
        launched: Mutex<Vec<Invocation>>,
    }

    impl ScriptedEngine {
        fn completing(steps: Vec<(&'static str, &'static str, &'static str)>) -> Self {
            Self {
                transcript: TRANSCRIPT.to_string(),
                exit_code: Some(0),
                steps,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PipelineEngine for ScriptedEngine {
        fn program(&self) -> &str {
            "nextflow"
        }

        async fn launch(&self, invocation: &Invocation, _limit: Duration) -> anyhow::Result<EngineOutput> {
            self.launched.lock().unwrap().push(invocation.clone());
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let dir = &invocation.working_dir;
            for (file, contents) in &self.produces {
                std::fs::write(dir.join(file), contents)?;
            }
            for (i, (_, _, stdout)) in self.steps.iter().enumerate() {
                let work = dir.join("work").join(i.to_string());
                std::fs::create_dir_all(&work)?;
                std::fs::write(work.join(".command.out"), stdout)?;
            }
            Ok(EngineOutput {
                exit_code: self.exit_code,
                transcript: self.transcript.clone(),
            })
        }

        async fn process_log(&self, run_dir: &Path, identifier: &str) -> anyhow::Result<String> {
            assert_eq!(identifier, "tiny_turing");
            Ok(self
                .steps
                .iter()
                .enumerate()
                .map(|(i, (name, status, _))| {
                    format!("{name}\t{}\t{status}\n", run_dir.join("work").join(i.to_string()).display())
                })
                .collect())
        }
    }

    struct Fixture {
        tmp: TempDir,
        pool: DbPool,
        orchestrator: Orchestrator,
        engine: Arc<ScriptedEngine>,
        command_id: i32,
        owner: UserId,
    }

    fn fixture(engine: ScriptedEngine) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("labflow.db");
        let pool = establish_connection_pool(db.to_str().unwrap()).unwrap();
        run_migrations(&mut pool.get().unwrap()).unwrap();

        let pipelines = tmp.path().join("pipelines");
        std::fs::create_dir_all(&pipelines).unwrap();
        std::fs::write(pipelines.join("count.nf"), "process COUNT {}\n").unwrap();
        let command = command_ops::create_command(&mut pool.get().unwrap(), "count", "", "count.nf", SCHEMA).unwrap();
        let owner = user_ops::create_user(&mut pool.get().unwrap(), "ada", "ada@lab.test").unwrap().id;

        let engine = Arc::new(engine);
        let orchestrator = Orchestrator::new(
            pool.clone(),
            engine.clone(),
            OrchestratorConfig {
                executions_root: tmp.path().join("executions"),
                pipelines_root: pipelines,
                engine_config: tmp.path().join("nextflow.config"),
                run_timeout: Duration::from_secs(30),
            },
        );
        Fixture {
            tmp,
            pool,
            orchestrator,
            engine,
            command_id: command.id,
            owner,
        }
    }

    impl Fixture {
        fn execution(&self, input: &str) -> Execution {
            self.owned_execution(self.owner, input, None, None)
        }

        /// A finished upstream with one file output, owned by `owner`.
        fn upstream(&self, owner: UserId, sample_id: Option<i32>, collection_id: Option<i32>) -> Execution {
            let up = self.owned_execution(owner, "[]", sample_id, collection_id);
            let mut conn = self.pool.get().unwrap();
            execution_ops::set_output(&mut conn, up.id, r#"[{"name":"fasta","type":"file","value":{"file":"ref.fa","size":3}}]"#).unwrap();
            execution_ops::finish(&mut conn, up.id, ExecutionStatus::Ok, "", "", labflow_sqlite::now()).unwrap();
            up
        }

        fn owned_execution(&self, owner: UserId, input: &str, sample_id: Option<i32>, collection_id: Option<i32>) -> Execution {
            let mut conn = self.pool.get().unwrap();
            let exec = execution_ops::create_execution(
                &mut conn,
                &ExecutionDraft {
                    name: "count reads",
                    command_id: Some(self.command_id),
                    private: sample_id.is_some() || collection_id.is_some(),
                    sample_id,
                    collection_id,
                    input,
                },
            )
            .unwrap();
            link_ops::set_execution_user_level(&mut conn, exec.id, owner, Permission::Own).unwrap();
            exec
        }

        fn reload(&self, id: ExecutionId) -> Execution {
            execution_ops::get_execution_by_id(&mut self.pool.get().unwrap(), id).unwrap()
        }
    }

    const READS_INPUT: &str = r#"[{"name":"reads","type":"file","value":"reads.fq"}]"#;

    fn reads() -> Vec<Upload> {
        vec![Upload::new("reads.fq", "@r1\nACGT\n+\nIIII\n")]
    }

    #[tokio::test]
    async fn test_successful_run_records_outputs() {
        let mut engine = ScriptedEngine::completing(vec![("COUNT (1)", "COMPLETED", "COUNT: 42\n")]);
        engine.produces = vec![("counts.tsv", "ACGT\t1\n")];
        let f = fixture(engine);
        let exec = f.execution(READS_INPUT);

        let dir = f.orchestrator.prepare(exec.id, &reads()).unwrap();
        assert!(dir.join("reads.fq").is_file());
        assert!(dir.join("count.nf").is_file());
        assert_eq!(f.reload(exec.id).status, "PREPARED");

        let done = f.orchestrator.run(exec.id).await.unwrap();
        assert_eq!(done.status, "OK");
        assert_eq!(done.error, "");
        assert_eq!(done.identifier, "tiny_turing");
        assert!(done.started.is_some());
        assert!(done.finished.is_some());
        assert!(done.terminal.contains("Launching"));
        assert!(done.command_line.starts_with("nextflow -C "));
        assert!(done.command_line.contains(&format!("--reads {}", dir.join("reads.fq").display())));

        let outputs = parse_params(&done.output).unwrap();
        let counts = outputs.iter().find(|p| p.name == "counts").unwrap();
        assert_eq!(counts.value, json!({"file": "counts.tsv", "size": 7}));
        let total = outputs.iter().find(|p| p.name == "total").unwrap();
        assert_eq!(total.value, json!("42"));

        let processes = process_ops::list_for_execution(&mut f.pool.get().unwrap(), exec.id).unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].name, "COUNT (1)");
        assert_eq!(processes[0].stdout, "COUNT: 42\n");
    }

    #[tokio::test]
    async fn test_missing_identifier_fails_run() {
        let mut engine = ScriptedEngine::completing(vec![]);
        engine.transcript = "ERROR ~ unknown option\n".to_string();
        let f = fixture(engine);
        let exec = f.execution(READS_INPUT);
        f.orchestrator.prepare(exec.id, &reads()).unwrap();

        let done = f.orchestrator.run(exec.id).await.unwrap();
        assert_eq!(done.status, "ERROR");
        assert!(done.error.contains("run identifier"));
        assert_eq!(done.terminal, "ERROR ~ unknown option\n");
        assert!(done.finished.is_some());
        assert!(parse_params(&done.output).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_process_is_sticky() {
        let mut engine = ScriptedEngine::completing(vec![
            ("COUNT (1)", "COMPLETED", "COUNT: 1\n"),
            ("MERGE", "FAILED", ""),
        ]);
        engine.produces = vec![("counts.tsv", "x\n")];
        let f = fixture(engine);
        let exec = f.execution(READS_INPUT);
        f.orchestrator.prepare(exec.id, &reads()).unwrap();

        let done = f.orchestrator.run(exec.id).await.unwrap();
        assert_eq!(done.status, "ERROR");
        assert!(done.error.contains("MERGE"));
        assert!(parse_params(&done.output).unwrap().is_empty());
        let processes = process_ops::list_for_execution(&mut f.pool.get().unwrap(), exec.id).unwrap();
        assert_eq!(processes.len(), 2);
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_run() {
        let mut engine = ScriptedEngine::completing(vec![("COUNT (1)", "COMPLETED", "")]);
        engine.exit_code = Some(1);
        let f = fixture(engine);
        let exec = f.execution(READS_INPUT);
        f.orchestrator.prepare(exec.id, &reads()).unwrap();

        let done = f.orchestrator.run(exec.id).await.unwrap();
        assert_eq!(done.status, "ERROR");
        assert_eq!(done.error, "Engine exited with status 1");
        assert!(done.finished.is_some());
    }

    #[tokio::test]
    async fn test_run_requires_prepared() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let exec = f.execution(READS_INPUT);

        let err = f.orchestrator.run(exec.id).await.unwrap_err();
        assert!(matches!(err, OrchError::InvalidState { expected: "PREPARED", .. }));
        let row = f.reload(exec.id);
        assert_eq!(row.status, "CREATED");
        assert!(row.started.is_none());
        assert!(f.engine.launched.lock().unwrap().is_empty());

        assert!(matches!(f.orchestrator.run(9999).await, Err(OrchError::NotFound(9999))));
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let exec = f.execution("[]");
        f.orchestrator.prepare(exec.id, &[]).unwrap();
        f.orchestrator.run(exec.id).await.unwrap();

        let err = f.orchestrator.run(exec.id).await.unwrap_err();
        assert!(matches!(err, OrchError::InvalidState { .. }));
        assert_eq!(f.engine.launched.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_existing_run_directory_fails_preparation() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let exec = f.execution(READS_INPUT);
        std::fs::create_dir_all(f.orchestrator.run_dir(exec.id)).unwrap();

        let err = f.orchestrator.prepare(exec.id, &reads()).unwrap_err();
        assert!(matches!(err, OrchError::PreparationFailure { .. }));
        let row = f.reload(exec.id);
        assert_eq!(row.status, "ERROR");
        assert!(row.finished.is_some());

        let again = f.orchestrator.prepare(exec.id, &reads()).unwrap_err();
        assert!(matches!(again, OrchError::InvalidState { expected: "CREATED", .. }));
    }

    #[test]
    fn test_concurrent_prepare_keeps_the_winner() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let exec = f.execution(READS_INPUT);

        let results: Vec<Result<PathBuf, OrchError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(|| f.orchestrator.prepare(exec.id, &reads())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(OrchError::InvalidState { expected: "CREATED", .. }))));
        let row = f.reload(exec.id);
        assert_eq!(row.status, "PREPARED");
        assert_eq!(row.error, "");
        assert!(row.finished.is_none());
    }

    #[test]
    fn test_missing_script_fails_preparation() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        std::fs::remove_file(f.tmp.path().join("pipelines").join("count.nf")).unwrap();
        let exec = f.execution("[]");

        let err = f.orchestrator.prepare(exec.id, &[]).unwrap_err();
        match err {
            OrchError::PreparationFailure { message, .. } => assert!(message.contains("count.nf")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unstaged_input_fails_run() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let exec = f.execution(READS_INPUT);
        f.orchestrator.prepare(exec.id, &[]).unwrap();

        let done = f.orchestrator.run(exec.id).await.unwrap();
        assert_eq!(done.status, "ERROR");
        assert!(done.error.contains("reads.fq"));
        assert!(done.finished.is_some());
        assert!(f.engine.launched.lock().unwrap().is_empty());
    }

    fn genome_input(upstream: ExecutionId) -> String {
        format!(r#"[{{"name":"genome","type":"data","value":{upstream}}}]"#)
    }

    #[tokio::test]
    async fn test_file_input_outside_run_directory_fails_run() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let exec = f.execution(r#"[{"name":"reads","type":"file","value":"../7/out.bam"}]"#);
        f.orchestrator.prepare(exec.id, &[]).unwrap();

        let done = f.orchestrator.run(exec.id).await.unwrap();
        assert_eq!(done.status, "ERROR");
        assert!(done.error.contains("plain file name"));
        assert!(f.engine.launched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_data_input_attaches_upstream() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let collection = {
            let mut conn = f.pool.get().unwrap();
            let collection = collection_ops::create_collection(&mut conn, "genomes", "", true).unwrap();
            link_ops::set_collection_user_level(&mut conn, collection.id, f.owner, Permission::Own).unwrap();
            collection
        };
        let upstream = f.upstream(f.owner, None, Some(collection.id));

        let exec = f.execution(&genome_input(upstream.id));
        f.orchestrator.prepare(exec.id, &[]).unwrap();
        let done = f.orchestrator.run(exec.id).await.unwrap();

        assert_eq!(done.status, "OK");
        let expected = f.orchestrator.run_dir(upstream.id).join("ref.fa");
        assert!(done.command_line.contains(&format!("--genome {}", expected.display())));
        let mut conn = f.pool.get().unwrap();
        assert_eq!(execution_ops::list_upstream_ids(&mut conn, exec.id).unwrap(), vec![upstream.id]);
        assert_eq!(done.collection_id, Some(collection.id));
        assert!(done.private);
    }

    #[tokio::test]
    async fn test_sample_parent_is_inherited() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let sample = {
            let mut conn = f.pool.get().unwrap();
            let sample = sample_ops::create_sample(&mut conn, "liver", true, None).unwrap();
            link_ops::set_sample_user_level(&mut conn, sample.id, f.owner, Permission::Edit).unwrap();
            sample
        };
        let upstream = f.upstream(f.owner, Some(sample.id), None);

        let exec = f.execution(&genome_input(upstream.id));
        assert!(!exec.private);
        f.orchestrator.prepare(exec.id, &[]).unwrap();
        let done = f.orchestrator.run(exec.id).await.unwrap();

        assert_eq!(done.status, "OK");
        assert_eq!(done.sample_id, Some(sample.id));
        assert_eq!(done.collection_id, None);
        assert!(done.private);
    }

    #[tokio::test]
    async fn test_parent_is_kept_when_owner_cannot_edit_it() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let upstream = {
            let mut conn = f.pool.get().unwrap();
            let curator = user_ops::create_user(&mut conn, "curator", "").unwrap().id;
            let collection = collection_ops::create_collection(&mut conn, "shared", "", true).unwrap();
            link_ops::set_collection_user_level(&mut conn, collection.id, curator, Permission::Own).unwrap();
            link_ops::set_collection_user_level(&mut conn, collection.id, f.owner, Permission::View).unwrap();
            drop(conn);
            f.upstream(curator, None, Some(collection.id))
        };

        let exec = f.execution(&genome_input(upstream.id));
        f.orchestrator.prepare(exec.id, &[]).unwrap();
        let done = f.orchestrator.run(exec.id).await.unwrap();

        assert_eq!(done.status, "OK");
        assert_eq!(done.parent(), Parent::None);
        assert!(!done.private);
    }

    #[tokio::test]
    async fn test_hidden_upstream_fails_run() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let upstream = {
            let mut conn = f.pool.get().unwrap();
            let rival = user_ops::create_user(&mut conn, "rival", "").unwrap().id;
            let collection = collection_ops::create_collection(&mut conn, "private", "", true).unwrap();
            link_ops::set_collection_user_level(&mut conn, collection.id, rival, Permission::Own).unwrap();
            drop(conn);
            f.upstream(rival, None, Some(collection.id))
        };

        let exec = f.execution(&genome_input(upstream.id));
        f.orchestrator.prepare(exec.id, &[]).unwrap();
        let done = f.orchestrator.run(exec.id).await.unwrap();

        assert_eq!(done.status, "ERROR");
        assert!(done.error.contains(&upstream.id.to_string()));
        assert_eq!(done.parent(), Parent::None);
        assert!(f.engine.launched.lock().unwrap().is_empty());
        let mut conn = f.pool.get().unwrap();
        assert!(execution_ops::list_upstream_ids(&mut conn, exec.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_upstream_fails_run() {
        let f = fixture(ScriptedEngine::completing(vec![]));
        let exec = f.execution(r#"[{"name":"genome","type":"data","value":777}]"#);
        f.orchestrator.prepare(exec.id, &[]).unwrap();

        let done = f.orchestrator.run(exec.id).await.unwrap();
        assert_eq!(done.status, "ERROR");
        assert!(done.error.contains("777"));
        let mut conn = f.pool.get().unwrap();
        assert!(execution_ops::list_upstream_ids(&mut conn, exec.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_run_is_marked_finished() {
        let mut engine = ScriptedEngine::completing(vec![]);
        engine.hang = true;
        let f = fixture(engine);
        let exec = f.execution("[]");
        f.orchestrator.prepare(exec.id, &[]).unwrap();

        let run = tokio::time::timeout(Duration::from_millis(200), f.orchestrator.run(exec.id)).await;
        assert!(run.is_err());
        let row = f.reload(exec.id);
        assert_eq!(row.status, "ERROR");
        assert!(row.error.contains("interrupted"));
        assert!(row.finished.is_some());
    }
}
