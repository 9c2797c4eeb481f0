mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use partner_cabinet::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
