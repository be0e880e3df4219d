//! A scripted HTTP server on localhost for exercising the CalDAV client.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// A request as the server received it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub depth: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

/// A canned reply.
pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    pub fn multistatus(body: &str) -> Self {
        Self {
            status: 207,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Answers each request with `reply(request, index)`, one connection each.
pub struct TestServer {
    pub url: Url,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    pub async fn start<F>(reply: F) -> Self
    where
        F: Fn(&Recorded, usize) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Some((stream, request)) = read_request(stream).await else {
                    continue;
                };
                let index = {
                    let mut log = log.lock().unwrap();
                    log.push(request.clone());
                    log.len() - 1
                };
                write_reply(stream, reply(&request, index)).await;
            }
        });

        Self { url, requests }
    }

    /// The URL for `path` on this server.
    pub fn at(&self, path: &str) -> Url {
        self.url.join(path).unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: TcpStream) -> Option<(BufReader<TcpStream>, Recorded)> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut depth = None;
    let mut authorization = None;
    let mut length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        let value = value.trim().to_string();
        match name.to_ascii_lowercase().as_str() {
            "depth" => depth = Some(value),
            "authorization" => authorization = Some(value),
            "content-length" => length = value.parse().ok()?,
            _ => {}
        }
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.ok()?;

    let request = Recorded {
        method,
        path,
        depth,
        authorization,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    Some((reader, request))
}

async fn write_reply(mut stream: BufReader<TcpStream>, reply: Reply) {
    let mut head = format!(
        "HTTP/1.1 {} Scripted\r\nContent-Type: application/xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let stream = stream.get_mut();
    stream.write_all(head.as_bytes()).await.ok();
    stream.write_all(reply.body.as_bytes()).await.ok();
    stream.shutdown().await.ok();
}
