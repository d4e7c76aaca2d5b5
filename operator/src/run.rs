use crate::{Error, Manager, Result, manager::Settings};
use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, Responder, get, middleware,
    web::Data,
};
use clap::Args;
use tokio::time::Duration;

#[derive(Args, Debug)]
pub struct Parameters {
    /// Address the metrics and health endpoints listen on
    #[arg(short, long, env = "LISTEN_ADDRESS", value_name = "LISTEN_ADDRESS", default_value = "0.0.0.0:9000")]
    pub listen: String,
    /// Lease deciding which replica is the leader
    #[arg(long, env = "LEASE_NAME", value_name = "LEASE_NAME", default_value = "catalogue-operator")]
    pub lease_name: String,
    /// Name of this replica
    #[arg(long, env = "POD_NAME", value_name = "POD_NAME", default_value = "unknown")]
    pub pod_name: String,
    /// Seconds before an active object is checked again
    #[arg(long, env = "REQUEUE_SECONDS", value_name = "REQUEUE_SECONDS", default_value_t = 900)]
    pub requeue_seconds: u64,
}

#[get("/metrics")]
async fn metrics(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    match c.metrics() {
        Ok(body) => HttpResponse::Ok()
            .content_type("application/openmetrics-text; version=1.0.0; charset=utf-8")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

pub async fn run(args: &Parameters) -> Result<()> {
    let (manager, controller_pages, controller_catalogues, election) = Manager::new(Settings {
        identity: args.pod_name.clone(),
        lease_name: args.lease_name.clone(),
        requeue: Duration::from_secs(args.requeue_seconds),
    })
    .await?;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(manager.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind(&args.listen)
    .map_err(|e| {
        tracing::error!("Can not bind to {}", args.listen);
        Error::Stdio(e)
    })?
    .shutdown_timeout(5);

    tokio::select! {
        _ = controller_pages => tracing::warn!("LandingPage controller exited"),
        _ = controller_catalogues => tracing::warn!("Catalogue controller exited"),
        _ = election => tracing::warn!("Leader election exited"),
        res = server.run() => {
            tracing::info!("actix exited");
            res?;
        }
    }
    Ok(())
}
