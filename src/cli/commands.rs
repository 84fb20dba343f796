use crate::app::{AppContext, HarvestError, Result};
use crate::cli::ListArgs;
use crate::daemon::Daemon;
use crate::domain::StoredJob;
use crate::scheduler::Scheduler;
use crate::store::JobStore;

/// One manual harvest. Refused while the daemon owns scheduled runs, since
/// its run gate lives in another process.
pub async fn run_harvest(ctx: &AppContext) -> Result<usize> {
    ensure_no_daemon(Daemon::running_pid())?;

    let scheduler = Scheduler::new(ctx.harvester.clone())?;
    let report = scheduler.run_now().await?;

    println!(
        "Harvest complete: {} new jobs ({} listed, {} already stored)",
        report.new_records, report.listed, report.touched
    );
    if report.skipped_rows > 0 {
        println!("  {} listing rows could not be parsed", report.skipped_rows);
    }
    Ok(report.new_records)
}

fn ensure_no_daemon(daemon_pid: Option<u32>) -> Result<()> {
    match daemon_pid {
        Some(pid) => Err(HarvestError::Other(format!(
            "The harvest daemon is running (PID {}); stop it before a manual run",
            pid
        ))),
        None => Ok(()),
    }
}

pub fn list_jobs(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let page = ctx.store.query_jobs(&args.filter(), args.page())?;

    if page.jobs.is_empty() {
        println!("No jobs ({} stored)", page.total);
        if args.department.is_some() {
            let departments = ctx.store.distinct_departments()?;
            if !departments.is_empty() {
                println!("Known departments:\n  {}", departments.join("\n  "));
            }
        }
        if args.location.is_some() {
            let locations = ctx.store.distinct_locations()?;
            if !locations.is_empty() {
                println!("Known locations:\n  {}", locations.join("\n  "));
            }
        }
        return Ok(());
    }

    for job in &page.jobs {
        println!("{}", format_job_line(job));
    }

    let first = args.offset + 1;
    let last = args.offset + page.jobs.len();
    println!(
        "\nShowing {}-{} of {} matching ({} stored)",
        first, last, page.filtered, page.total
    );

    Ok(())
}

pub fn show_job(ctx: &AppContext, requisition_id: &str) -> Result<()> {
    let job = ctx
        .store
        .find_job(requisition_id)?
        .ok_or_else(|| HarvestError::Other(format!("Job not found: {}", requisition_id)))?;

    let json = serde_json::to_string_pretty(&job)
        .map_err(|e| HarvestError::Other(format!("Failed to serialize job: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn format_job_line(job: &StoredJob) -> String {
    let mut line = format!("{:<12} {}", job.requisition_id, job.title);

    let mut facts = Vec::new();
    if let Some(department) = job.department.as_deref().filter(|d| !d.is_empty()) {
        facts.push(department.to_string());
    }
    if let Some(location) = job.location.as_deref().filter(|l| !l.is_empty()) {
        facts.push(location.to_string());
    }
    let salary = job.display_salary();
    if !salary.is_empty() {
        facts.push(salary);
    }
    let closing = job.display_closing_date();
    if !closing.is_empty() {
        facts.push(format!("closes {}", closing));
    }

    if !facts.is_empty() {
        line.push_str("\n             ");
        line.push_str(&facts.join(" | "));
    }
    line
}
