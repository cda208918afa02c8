fn main() {
    if let Err(err) = macsweep::cli::run() {
        macsweep::ui::eprintln_error(&err);
        std::process::exit(macsweep::exit::exit_code(&err));
    }
}
