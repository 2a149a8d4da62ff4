//! Submission Store (§3.1/§4.3): the durable record of every submission,
//! backed by PostgreSQL via `sqlx`.

use chrono::DateTime;
use chrono::Utc;
use judge_protocol::error::JudgeError;
use judge_protocol::submission::AdditionalFile;
use judge_protocol::submission::SandboxLimits;
use judge_protocol::submission::Submission;
use judge_protocol::submission::SubmissionMeta;
use judge_protocol::submission::SubmissionStatus;
use sqlx::PgPool;
use sqlx::Row;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

fn infra(e: sqlx::Error) -> JudgeError {
    JudgeError::infrastructure(e.to_string())
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// The fields a worker writes back on commit (§4.3 `UpdateResult`).
pub struct ResultUpdate {
    pub status: SubmissionStatus,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
    pub compile_output: Option<Vec<u8>>,
    pub meta: Option<SubmissionMeta>,
}

pub enum UpdateOutcome {
    Ok,
    NotFound,
    IllegalTransition,
    Discarded,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, JudgeError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(infra)?;
        Ok(Self { pool })
    }

    /// A trivial round-trip query used by the health endpoint; distinct from
    /// `migrate` which only runs once at startup.
    pub async fn ping(&self) -> Result<(), JudgeError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(infra)?;
        Ok(())
    }

    pub async fn migrate(&self) -> Result<(), JudgeError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| JudgeError::infrastructure(e.to_string()))
    }

    pub async fn create(&self, submission: &Submission) -> Result<(), JudgeError> {
        let additional_files_json =
            serde_json::to_value(&submission.additional_files).map_err(|e| JudgeError::infrastructure(e.to_string()))?;
        let limits = submission.limits;

        sqlx::query(
            r#"
            INSERT INTO submissions (
                id, language_id, source_code, stdin, expected_output, additional_files,
                cpu_time_limit, cpu_extra_time, wall_time_limit, memory_limit,
                max_processes_and_or_threads, max_file_size, number_of_runs,
                enable_per_process_and_thread_time_limit, enable_per_process_and_thread_memory_limit,
                redirect_stderr_to_stdout, enable_network,
                status, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
            "#,
        )
        .bind(submission.id)
        .bind(submission.language_id)
        .bind(&submission.source_code)
        .bind(&submission.stdin)
        .bind(&submission.expected_output)
        .bind(additional_files_json)
        .bind(limits.cpu_time_limit)
        .bind(limits.cpu_extra_time)
        .bind(limits.wall_time_limit)
        .bind(limits.memory_limit as i64)
        .bind(limits.max_processes_and_or_threads as i32)
        .bind(limits.max_file_size as i64)
        .bind(limits.number_of_runs as i32)
        .bind(limits.enable_per_process_and_thread_time_limit)
        .bind(limits.enable_per_process_and_thread_memory_limit)
        .bind(limits.redirect_stderr_to_stdout)
        .bind(limits.enable_network)
        .bind(status_str(submission.status))
        .bind(submission.created_at)
        .execute(&self.pool)
        .await
        .map_err(infra)?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Submission>, JudgeError> {
        let row = sqlx::query("SELECT * FROM submissions WHERE id = $1 AND deleted = false")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infra)?;
        row.map(row_to_submission).transpose()
    }

    /// Returns only existing, non-deleted ids, in the same order as `ids`
    /// with duplicates collapsed and missing entries dropped (§4.3).
    pub async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Submission>, JudgeError> {
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let rows = sqlx::query("SELECT * FROM submissions WHERE id = ANY($1) AND deleted = false")
            .bind(&unique)
            .fetch_all(&self.pool)
            .await
            .map_err(infra)?;

        let mut by_id = std::collections::HashMap::new();
        for row in rows {
            let submission = row_to_submission(row)?;
            by_id.insert(submission.id, submission);
        }

        Ok(unique.into_iter().filter_map(|id| by_id.remove(&id)).collect())
    }

    pub async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<Submission>, u64), JudgeError> {
        let offset = i64::from(page - 1) * i64::from(page_size);

        let total: i64 = sqlx::query("SELECT count(*) AS count FROM submissions WHERE deleted = false")
            .fetch_one(&self.pool)
            .await
            .map_err(infra)?
            .try_get("count")
            .map_err(infra)?;

        let rows = sqlx::query(
            "SELECT * FROM submissions WHERE deleted = false ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)?;

        let items = rows.into_iter().map(row_to_submission).collect::<Result<Vec<_>, _>>()?;
        Ok((items, total.max(0) as u64))
    }

    /// Enforces monotonic status via a conditional update: only rows whose
    /// current status may legally transition to `update.status` are
    /// affected (§5's "no explicit locks in caller code").
    pub async fn update_result(&self, id: Uuid, update: ResultUpdate) -> Result<UpdateOutcome, JudgeError> {
        let allowed_predecessors = predecessors_for(update.status);
        let meta_json = update
            .meta
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| JudgeError::infrastructure(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET status = $1, stdout = $2, stderr = $3, compile_output = $4, meta = $5
            WHERE id = $6 AND status = ANY($7) AND deleted = false
            "#,
        )
        .bind(status_str(update.status))
        .bind(&update.stdout)
        .bind(&update.stderr)
        .bind(&update.compile_output)
        .bind(meta_json)
        .bind(id)
        .bind(allowed_predecessors)
        .execute(&self.pool)
        .await
        .map_err(infra)?;

        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Ok);
        }

        // Distinguish "doesn't exist / deleted mid-flight" from "illegal
        // transition attempted against a live, non-matching row".
        let exists: Option<(bool,)> = sqlx::query_as("SELECT deleted FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infra)?;

        match exists {
            None => Ok(UpdateOutcome::NotFound),
            Some((true,)) => Ok(UpdateOutcome::Discarded),
            Some((false,)) => Ok(UpdateOutcome::IllegalTransition),
        }
    }

    /// Best-effort delete (§4.3): a submission mid-processing is tombstoned
    /// rather than removed, so the worker's eventual write is discarded.
    pub async fn delete(&self, id: Uuid) -> Result<bool, JudgeError> {
        let result = sqlx::query("UPDATE submissions SET deleted = true WHERE id = $1 AND deleted = false")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(result.rows_affected() > 0)
    }
}

fn predecessors_for(next: SubmissionStatus) -> Vec<String> {
    use SubmissionStatus::*;
    let predecessors: &[SubmissionStatus] = match next {
        Processing => &[Pending],
        Finished | Error | Cancelled => &[Pending, Processing],
        Pending => &[],
    };
    predecessors.iter().map(|s| status_str(*s).to_string()).collect()
}

fn status_str(status: SubmissionStatus) -> &'static str {
    match status {
        SubmissionStatus::Pending => "PENDING",
        SubmissionStatus::Processing => "PROCESSING",
        SubmissionStatus::Finished => "FINISHED",
        SubmissionStatus::Error => "ERROR",
        SubmissionStatus::Cancelled => "CANCELLED",
    }
}

fn parse_status(raw: &str) -> Result<SubmissionStatus, JudgeError> {
    match raw {
        "PENDING" => Ok(SubmissionStatus::Pending),
        "PROCESSING" => Ok(SubmissionStatus::Processing),
        "FINISHED" => Ok(SubmissionStatus::Finished),
        "ERROR" => Ok(SubmissionStatus::Error),
        "CANCELLED" => Ok(SubmissionStatus::Cancelled),
        other => Err(JudgeError::infrastructure(format!("unknown status in row: {other}"))),
    }
}

fn row_to_submission(row: sqlx::postgres::PgRow) -> Result<Submission, JudgeError> {
    let additional_files_json: serde_json::Value = row.try_get("additional_files").map_err(infra)?;
    let additional_files: Vec<AdditionalFile> =
        serde_json::from_value(additional_files_json).map_err(|e| JudgeError::infrastructure(e.to_string()))?;

    let meta_json: Option<serde_json::Value> = row.try_get("meta").map_err(infra)?;
    let meta = meta_json
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| JudgeError::infrastructure(e.to_string()))?;

    let status: String = row.try_get("status").map_err(infra)?;

    let limits = SandboxLimits {
        cpu_time_limit: row.try_get("cpu_time_limit").map_err(infra)?,
        cpu_extra_time: row.try_get("cpu_extra_time").map_err(infra)?,
        wall_time_limit: row.try_get("wall_time_limit").map_err(infra)?,
        memory_limit: row.try_get::<i64, _>("memory_limit").map_err(infra)? as u64,
        max_processes_and_or_threads: row.try_get::<i32, _>("max_processes_and_or_threads").map_err(infra)? as u32,
        max_file_size: row.try_get::<i64, _>("max_file_size").map_err(infra)? as u64,
        number_of_runs: row.try_get::<i32, _>("number_of_runs").map_err(infra)? as u32,
        enable_per_process_and_thread_time_limit: row
            .try_get("enable_per_process_and_thread_time_limit")
            .map_err(infra)?,
        enable_per_process_and_thread_memory_limit: row
            .try_get("enable_per_process_and_thread_memory_limit")
            .map_err(infra)?,
        redirect_stderr_to_stdout: row.try_get("redirect_stderr_to_stdout").map_err(infra)?,
        enable_network: row.try_get("enable_network").map_err(infra)?,
    };

    Ok(Submission {
        id: row.try_get("id").map_err(infra)?,
        language_id: row.try_get("language_id").map_err(infra)?,
        source_code: row.try_get("source_code").map_err(infra)?,
        stdin: row.try_get("stdin").map_err(infra)?,
        expected_output: row.try_get("expected_output").map_err(infra)?,
        additional_files,
        limits,
        status: parse_status(&status)?,
        stdout: row.try_get("stdout").map_err(infra)?,
        stderr: row.try_get("stderr").map_err(infra)?,
        compile_output: row.try_get("compile_output").map_err(infra)?,
        meta,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(infra)?,
    })
}
