use crate::cli::ScanFormat;
use crate::config::Settings;
use crate::context::Session;
use crate::error::{CliError, CliResult};
use crate::output;
use lazydynamo_core::ViewAction;

pub struct ScanOpts {
    pub format: ScanFormat,
    pub inspect: Option<usize>,
    pub refresh: bool,
}

pub async fn run(settings: &Settings, table: &str, opts: &ScanOpts) -> CliResult<()> {
    let mut session = Session::connect(settings, opts.refresh).await?;
    let result = show(&mut session, table, opts).await;
    session.finish(settings.refresh_wait).await;
    result
}

async fn show(session: &mut Session, table: &str, opts: &ScanOpts) -> CliResult<()> {
    session.load_tables().await?;
    session.load_rows(table).await?;

    if let Some(index) = opts.inspect {
        let browser = session.browser_mut();
        let len = browser.rows().len();
        if !browser.act(ViewAction::Inspect(index)) {
            return Err(CliError::Usage(format!(
                "row {index} out of range ('{table}' has {len} rows)"
            )));
        }
        if let Some(pretty) = browser.inspected_row() {
            println!("{pretty}");
        }
        return Ok(());
    }

    let rows = session.browser().rows();
    if rows.is_empty() {
        eprintln!("Table '{table}' is empty.");
        return Ok(());
    }
    println!("{}", output::format_rows(rows, opts.format)?);
    Ok(())
}
