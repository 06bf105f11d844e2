use crate::cli::ConfigAction;
use crate::config::Settings;

pub fn run(action: ConfigAction, settings: &Settings) {
    match action {
        ConfigAction::Path => println!("{}", settings.config_path.display()),
        ConfigAction::Show => {
            for (key, value) in settings.describe() {
                println!("{key} = {value}");
            }
        }
    }
}
