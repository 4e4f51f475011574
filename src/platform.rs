/// Hand a file to the host OS's default application.
///
/// The dispatch differs per platform but the contract is the same:
/// spawn-and-forget, no completion signal consumed.
use std::io;
use std::path::Path;
use std::process::Command;

#[cfg(target_os = "windows")]
pub fn open_with_default_app(path: &Path) -> io::Result<()> {
    // `start` is a cmd builtin; the empty string is the window title slot
    Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(path)
        .spawn()?;
    Ok(())
}

#[cfg(target_os = "macos")]
pub fn open_with_default_app(path: &Path) -> io::Result<()> {
    Command::new("open").arg(path).spawn()?;
    Ok(())
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn open_with_default_app(path: &Path) -> io::Result<()> {
    Command::new("xdg-open").arg(path).spawn()?;
    Ok(())
}
