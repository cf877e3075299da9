use std::error::Error;

use native_dialog::{MessageDialog, MessageType};

const ALERT_TITLE: &str = "CLWS Emulator";

/// Report an error that ends the process. The error is always logged; with show_dialog set it is
/// also shown in a blocking dialog, so an operator who started the emulator from a desktop sees it.
pub fn report_fatal(error: &dyn Error, show_dialog: bool) {
    log::error!("{} Shutting down.", error);
    if !show_dialog {
        return;
    }
    let text = format!("{}", error);
    if let Err(e) = MessageDialog::new()
        .set_type(MessageType::Error)
        .set_title(ALERT_TITLE)
        .set_text(&text)
        .show_alert()
    {
        log::warn!("Could not show the error dialog: {}", e);
    }
}
