#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = cdisc_library_mcp::mcp::server::run_stdio().await {
        eprintln!("cdisc-library-mcp: {}", err);
        std::process::exit(1);
    }
}
