use crate::config::Settings;
use crate::context::Session;
use crate::error::CliResult;
use lazydynamo_core::ViewAction;

pub async fn run(settings: &Settings, filter: Option<&str>, refresh: bool) -> CliResult<()> {
    let mut session = Session::connect(settings, refresh).await?;
    let result = list(&mut session, filter).await;
    session.finish(settings.refresh_wait).await;
    result
}

async fn list(session: &mut Session, filter: Option<&str>) -> CliResult<()> {
    session.load_tables().await?;

    if let Some(query) = filter {
        session
            .browser_mut()
            .act(ViewAction::SetFilter(query.to_string()));
    }

    let visible = session.browser().visible_tables();
    if visible.is_empty() {
        if session.browser().tables().is_empty() {
            eprintln!("No tables found.");
        } else {
            eprintln!("No tables match '{}'.", session.browser().filter());
        }
        return Ok(());
    }

    for name in visible {
        println!("{name}");
    }
    Ok(())
}
