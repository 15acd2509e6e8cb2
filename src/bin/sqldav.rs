//
//  Webdav server over one database table.
//
//  Every setting can come from the environment, so a bare
//  `DATABASE_URL=... sqldav` is a working deployment.
//

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use sqldav::fs::TableFs;
use sqldav::{AuthGate, BrowserMode, DavHandler};

#[derive(Debug, clap::Parser)]
#[command(about, version)]
struct Cli {
    /// port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// database connection URL (sqlite:, postgres: or mysql:)
    #[arg(short, long, env = "DATABASE_URL")]
    database_url: String,
    /// name of the table backing the filesystem
    #[arg(short, long, env = "TABLE_NAME", default_value = "filesystem")]
    table: String,
    /// browser GET behavior: disabled, enabled or list
    #[arg(short, long, env = "BROWSER", default_value = "disabled")]
    browser: String,
    /// basic-auth username
    #[arg(short = 'u', long, env = "USERNAME")]
    username: Option<String>,
    /// basic-auth password
    #[arg(short = 'w', long, env = "PASSWORD")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let browser: BrowserMode = cli.browser.parse()?;

    let fs = TableFs::connect(&cli.database_url, &cli.table).await?;
    let mut builder = DavHandler::builder(Arc::new(fs)).browser(browser);
    if let (Some(user), Some(pass)) = (cli.username, cli.password) {
        builder = builder.auth(AuthGate::credentials(user, pass));
    }
    let dav_server = builder.build();

    let make_service = hyper::service::make_service_fn(move |_| {
        let dav_server = dav_server.clone();
        async move {
            let func = move |req| {
                let dav_server = dav_server.clone();
                async move { Ok::<_, Infallible>(dav_server.handle(req).await) }
            };
            Ok::<_, Infallible>(hyper::service::service_fn(func))
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    println!("Serving table '{}' on {}", cli.table, addr);
    hyper::Server::try_bind(&addr)?.serve(make_service).await?;
    Ok(())
}
