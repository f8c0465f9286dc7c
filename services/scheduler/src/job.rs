//! Periodic roll-forward of recurring sessions

use classroom::{Classroom, CoreError, RollForwardReport};
use std::time::Duration;
use tokio::time::sleep;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

#[derive(Clone)]
pub struct RollForwardJob {
    classroom: Classroom,
    max_retries: u32,
    base_delay: Duration,
}

impl RollForwardJob {
    pub fn new(classroom: Classroom) -> Self {
        Self {
            classroom,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_delay = base_delay;
        self
    }

    pub async fn run_once(&self) -> Result<RollForwardReport, CoreError> {
        self.classroom.roll_forward_weekly_sessions().await
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run a pass, retrying with exponential backoff when the store fails
    pub async fn run_with_retry(&self) -> Result<RollForwardReport, CoreError> {
        let mut attempt = 0;
        loop {
            match self.run_once().await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    attempt += 1;
                    error!(
                        "Roll-forward failed (attempt {}/{}): {}",
                        attempt, self.max_retries, e
                    );
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    sleep(self.backoff_delay(attempt)).await;
                }
            }
        }
    }

    /// Register the job on a new scheduler and start it
    pub async fn start(&self, schedule: &str) -> anyhow::Result<JobScheduler> {
        let job_runner = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let job_runner = job_runner.clone();
            Box::pin(async move {
                info!("Roll-forward job executed");
                if let Err(e) = job_runner.run_with_retry().await {
                    error!(
                        "Roll-forward gave up after {} attempts: {}",
                        job_runner.max_retries, e
                    );
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started roll-forward scheduler with schedule: {}", schedule);
        Ok(scheduler)
    }
}
