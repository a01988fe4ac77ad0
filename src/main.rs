fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let code = ezbake_fpm::run_cli();
    if code != 0 {
        std::process::exit(code);
    }
}
