use std::hint::black_box;

use bytes::BytesMut;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tern_http::codec::RequestDecoder;
use tokio_util::codec::Decoder;

const SMALL_REQUEST: &str = "GET /test/42 HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: curl/8.5.0\r\nAccept: */*\r\n\r\n";

const FORM_REQUEST: &str = concat!(
    "POST /upload HTTP/1.1\r\n",
    "Host: localhost:8080\r\n",
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:131.0) Gecko/20100101 Firefox/131.0\r\n",
    "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n",
    "Accept-Language: en-US,en;q=0.5\r\n",
    "Accept-Encoding: gzip, deflate, br, zstd\r\n",
    "Content-Type: application/x-www-form-urlencoded\r\n",
    "Content-Length: 27\r\n",
    "Origin: http://localhost:8080\r\n",
    "Connection: keep-alive\r\n",
    "Referer: http://localhost:8080/form\r\n",
    "Cookie: sid=3f2504e04f8911d39a0c0305e82c3301; theme=dark\r\n",
    "\r\n",
    "name=tern&kind=bird&size=12",
);

fn benchmark_request_decoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("request_decoder");

    for (name, request) in [("small_get", SMALL_REQUEST), ("form_post", FORM_REQUEST)] {
        group.throughput(Throughput::Bytes(request.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), request, |b, request| {
            let mut request_decoder = RequestDecoder::new();
            b.iter_batched_ref(
                || BytesMut::from(request),
                |bytes_mut| {
                    let header = request_decoder.decode(bytes_mut).expect("input should be valid http request header").unwrap();
                    let body = request_decoder.decode(bytes_mut).expect("input should be valid http request body").unwrap();
                    black_box((header, body));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_request_decoder);
criterion_main!(decoder);
