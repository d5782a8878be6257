use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pigeon::compiler::{optimize, CompileOptions, Compiler};
use pigeon::parser::parse_expression;
use pigeon::Scanner;

const PROGRAM: &str = r#"
    i32 total = 0;
    i8 step = 3;

    i32 clamp(i32 v, i32 low, i32 high) {
        if (v < low) return low;
        if (v > high) return high;
        return v;
    }

    void accumulate(i32 amount) {
        total = total + clamp(amount, 0, 100);
    }

    i32 main() {
        while (total < 1000) {
            accumulate(input + step - 1);
        }
        return total - 2 * 3 + 1;
    }
"#;

/// Generates `count` small functions that each call the previous one
fn generated_program(count: usize) -> String {
    let mut source = String::from("i32 f0(i32 a) { return a + 1; }\n");
    for i in 1..count {
        source.push_str(&format!(
            "i32 f{}(i32 a) {{ if (a > {}) return f{}(a - 1); return a + {}; }}\n",
            i,
            i,
            i - 1,
            i
        ));
    }
    source.push_str(&format!("i32 main() {{ return f{}(input); }}\n", count - 1));
    source
}

fn lexer_benchmark(c: &mut Criterion) {
    c.bench_function("tokenize program", |b| {
        b.iter(|| {
            let mut scanner = Scanner::new("bench", black_box(PROGRAM));
            scanner.scan_tokens().unwrap()
        })
    });
}

fn optimizer_benchmark(c: &mut Criterion) {
    let node = parse_expression("bench", "1 + x - (2 * 3 - y) + -(z - 4) + 10 / 2 + (w * 1) - 7").unwrap();

    c.bench_function("optimize additive chain", |b| {
        b.iter(|| optimize(black_box(&node)))
    });
}

fn compile_benchmark(c: &mut Criterion) {
    c.bench_function("compile program", |b| {
        b.iter(|| {
            Compiler::new(CompileOptions::default())
                .compile(black_box(PROGRAM))
                .unwrap()
        })
    });

    let mut group = c.benchmark_group("compile_functions");
    for count in [10, 50, 200].iter() {
        let source = generated_program(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, source| {
            b.iter(|| {
                Compiler::new(CompileOptions::default())
                    .compile(black_box(source))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, lexer_benchmark, optimizer_benchmark, compile_benchmark);
criterion_main!(benches);
