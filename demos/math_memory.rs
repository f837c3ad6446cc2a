use mom_socket::{
    DialOptions, ListenOptions, MemoryHub, Message, Result, Socket, Transport, TransportBuilder,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i32,
    b: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i32,
}

async fn serve(socket: Socket) {
    // ---
    while let Ok(msg) = socket.recv().await {
        let reply = match serde_json::from_slice::<AddRequest>(&msg.body) {
            Ok(req) => serde_json::to_vec(&AddResponse { sum: req.a + req.b })
                .map(Message::new)
                .unwrap_or_default(),
            Err(err) => Message::default().with_header("Error", err.to_string()),
        };

        if socket.send(&reply).await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let transport = TransportBuilder::new().memory(MemoryHub::new()).build()?;

    let listener = transport.listen("math", ListenOptions::default()).await?;
    let server = listener.clone();
    let handle = tokio::spawn(async move { server.accept(serve).await });

    let client = transport.dial(listener.addr(), DialOptions::default()).await?;

    for (a, b) in [(20, 3), (1, 1), (-4, 9)] {
        let body = serde_json::to_vec(&AddRequest { a, b })?;
        let reply = client.request(&Message::new(body)).await?;
        let resp: AddResponse = serde_json::from_slice(&reply.body)?;
        println!("{a} + {b} = {}", resp.sum);
    }

    client.close().await?;
    listener.close().await?;
    handle.await.expect("accept task panicked")?;
    Ok(())
}
