mod app;

fn main() {
    env_logger::builder()
        .parse_env(env_logger::Env::new().filter_or("PSTREE_LOG", "warn"))
        .format_timestamp(None)
        .init();

    if let Err(err) = app::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
