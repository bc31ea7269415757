use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use casgate::ProtocolVersion;

fn xml_success(n_attrs: usize) -> String {
    let mut attrs = String::new();
    for i in 0..n_attrs {
        attrs.push_str(&format!("<cas:attr{0}>value-{0}</cas:attr{0}>", i));
    }
    format!(
        "<cas:serviceResponse xmlns:cas=\"http://www.yale.edu/tp/cas\"><cas:authenticationSuccess><cas:user>alice</cas:user><cas:attributes>{}</cas:attributes></cas:authenticationSuccess></cas:serviceResponse>",
        attrs
    )
}

const XML_FAILURE: &str = "<cas:serviceResponse xmlns:cas=\"http://www.yale.edu/tp/cas\"><cas:authenticationFailure code=\"INVALID_TICKET\">Ticket ST-1 not recognized</cas:authenticationFailure></cas:serviceResponse>";

fn bench_plain_text(c: &mut Criterion) {
    let mut g = c.benchmark_group("validate_v1");
    g.bench_function("yes", |b| b.iter(|| ProtocolVersion::V1.parse(black_box("yes\nalice\n"))));
    g.bench_function("no", |b| b.iter(|| ProtocolVersion::V1.parse(black_box("no\n"))));
    g.finish();
}

fn bench_xml(c: &mut Criterion) {
    let mut g = c.benchmark_group("service_validate_xml");
    for &n in &[0usize, 8, 64] {
        let body = xml_success(n);
        g.throughput(Throughput::Bytes(body.len() as u64));
        g.bench_with_input(BenchmarkId::new("success_attrs", n), &body, |b, body| {
            b.iter(|| ProtocolVersion::V3.parse(black_box(body)))
        });
    }
    g.bench_function("failure", |b| b.iter(|| ProtocolVersion::V2.parse(black_box(XML_FAILURE))));
    g.finish();
}

criterion_group!(benches, bench_plain_text, bench_xml);
criterion_main!(benches);
