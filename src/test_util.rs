use std::net::SocketAddr;

use axum::Router;

/// Serve `app` on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
  let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
    .serve(app.into_make_service());
  let addr = server.local_addr();
  tokio::spawn(server);
  addr
}
