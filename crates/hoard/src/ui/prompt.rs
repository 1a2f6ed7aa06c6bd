use console::{Term, style};
use hoard_fetch::Credential;

/// Ask for a token on the terminal. `None` when stderr is not a terminal or
/// the answer is empty.
pub fn ask_token(reason: &str) -> Option<Credential> {
    let term = Term::stderr();
    if !term.is_term() {
        return None;
    }
    term.write_line(&format!("{} {reason}", style("?").cyan().bold())).ok()?;
    term.write_line(&style("Paste the token from your browser's developer tools (input is hidden):").dim().to_string())
        .ok()?;

    let line = term.read_secure_line().ok()?;
    let credential = Credential::from_pasted(&line);
    (!credential.is_empty()).then_some(credential)
}
