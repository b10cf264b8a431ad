use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{Method, Response, StatusCode};
use micro_httpd::codec::{RequestDecoder, ResponseEncoder};
use micro_httpd::connection::HttpConnection;
use micro_httpd::handler::make_handler;
use micro_httpd::routes::Routes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use tokio_util::codec::{Decoder, Encoder};

const GET_REQUEST: &[u8] = b"GET /sensors/temp HTTP/1.1\r\nHost: 192.168.4.1\r\nAccept: text/plain\r\n\r\n";

const POST_REQUEST: &[u8] = b"POST /sensors/temp HTTP/1.1\r\nHost: 192.168.4.1\r\nContent-Type: text/plain\r\nContent-Length: 4\r\n\r\n21.5";

fn bench_request_decoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_decoder");

    group.bench_function("get", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(GET_REQUEST);
            black_box(decoder.decode(&mut bytes).unwrap());
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });

    group.bench_function("post_with_body", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(POST_REQUEST);
            while let Some(message) = decoder.decode(&mut bytes).unwrap() {
                black_box(message);
                if bytes.is_empty() {
                    break;
                }
            }
        });
    });

    group.finish();
}

fn bench_response_encoder(c: &mut Criterion) {
    c.bench_function("encode_response", |b| {
        b.iter(|| {
            let response = Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "text/plain")
                .body(Bytes::from_static(b"21.5"))
                .unwrap();

            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            encoder.encode(response, &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_connection_roundtrip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

    let routes = Arc::new(Routes::default());
    let handler = make_handler(|_request| Ok(Response::new(Bytes::from_static(b"21.5"))));
    routes.register("/sensors/temp", Method::GET, Arc::new(handler)).unwrap();

    c.bench_function("connection_get", |b| {
        b.to_async(&runtime).iter(|| {
            let routes = Arc::clone(&routes);
            async move {
                let (mut client, server) = duplex(4096);
                let (reader, writer) = tokio::io::split(server);
                let connection = HttpConnection::new(reader, writer, routes, Duration::from_secs(1));

                client.write_all(GET_REQUEST).await.unwrap();
                client.shutdown().await.unwrap();

                let (result, output) = tokio::join!(connection.process(), async {
                    let mut output = Vec::new();
                    client.read_to_end(&mut output).await.unwrap();
                    output
                });
                result.unwrap();
                black_box(output);
            }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_connection_roundtrip);
criterion_main!(benches);
