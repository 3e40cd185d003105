use mission_control::Config;

/// Prints the default configuration as TOML so an operator can redirect it to a file,
/// edit the knobs they care about, and pass the result to `mission-control`.
fn main() {
    let config = Config::default();
    let toml = serdeconv::to_toml_string(&config).expect("failed to serialize default config");
    print!("{}", toml);
}
