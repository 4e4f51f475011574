/// UI module
///
/// The two application tabs plus the shared native dialogs both of them
/// use for errors and confirmations.

pub mod generate;
pub mod history;

use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

/// Show a modal error dialog
pub fn show_error(title: &str, message: &str) {
    MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title(title)
        .set_description(message)
        .show();
}

/// Blocking yes/no confirmation. Returns true if the user confirmed.
pub fn confirm(title: &str, message: &str) -> bool {
    let result = MessageDialog::new()
        .set_level(MessageLevel::Warning)
        .set_title(title)
        .set_description(message)
        .set_buttons(MessageButtons::YesNo)
        .show();

    result == MessageDialogResult::Yes
}
