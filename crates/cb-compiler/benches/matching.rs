use cb_compiler::build_rule_set;
use cb_core::types::ResourceType;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Synthetic list mixing every rule shape the parser accepts.
fn synthetic_list(rules: usize) -> String {
    let mut text = String::from("[Adblock Plus 2.0]\n! Title: Bench\n");
    for i in 0..rules {
        let line = match i % 6 {
            0 => format!("||ads{i}.example.com^"),
            1 => format!("/banner{i}/*$image,third-party"),
            2 => format!("@@||ads{}.example.com/ok.js|", i - 2),
            3 => format!("||track{i}.example^$domain=site{i}.com|~other.com"),
            4 => format!("|https://cdn{i}.example.net/ad.js|"),
            _ => format!("example{i}.com##.ad-slot-{i}"),
        };
        text.push_str(&line);
        text.push('\n');
    }
    text
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [1_000usize, 10_000] {
        let text = synthetic_list(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| build_rule_set(black_box(text), true));
        });
    }
    group.finish();
}

fn bench_check_url(c: &mut Criterion) {
    let set = build_rule_set(&synthetic_list(10_000), true);
    let requests = [
        ("http://news.site.com/", "http://ads60.example.com/pixel.gif", ResourceType::Image),
        ("http://news.site.com/", "http://ads62.example.com/ok.js", ResourceType::Script),
        ("http://news.site.com/", "http://img.net/banner7/1.png", ResourceType::Image),
        ("http://news.site.com/", "https://static.unrelated.org/app/main.js?v=12345", ResourceType::Script),
    ];

    let mut group = c.benchmark_group("check_url");
    group.throughput(Throughput::Elements(requests.len() as u64));
    group.bench_function("mixed", |b| {
        b.iter(|| {
            for (base, request, resource_type) in &requests {
                black_box(set.check_url(base, request, *resource_type));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_check_url);
criterion_main!(benches);
