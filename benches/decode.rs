use criterion::{black_box, criterion_group, criterion_main, Criterion};

use duotone::{
    from_slice_as, from_str_as, BinaryTokenWriter, CodecRegistry, DecodeOptions, Field,
    TypeBinding,
};

#[derive(Debug, Default)]
struct Event {
    id: i64,
    source: String,
    level: String,
    flagged: bool,
}

fn registry() -> CodecRegistry {
    let registry = CodecRegistry::new();
    let event = registry.register(
        TypeBinding::builder("Event")
            .with_factory(|| Box::new(Event::default()))
            .with_field(Field::<Event>::i64("id", |event, value| event.id = value))
            .with_field(Field::<Event>::string("source", |event, value| {
                event.source = value
            }))
            .with_field(Field::<Event>::string("level", |event, value| {
                event.level = value
            }))
            .with_field(Field::<Event>::bool("flagged", |event, value| {
                event.flagged = value
            }))
            .build(),
    );
    registry.register(TypeBinding::builder("Message").with_subtype(event).build());
    registry
}

fn binary_payload() -> Vec<u8> {
    let mut writer = BinaryTokenWriter::new();
    writer
        .object_start()
        .field("@type")
        .str("Event")
        .field("id")
        .i64(42)
        .field("source")
        .str("sensor-7")
        .field("level")
        .str("warning")
        .field("flagged")
        .bool(true)
        .object_end();
    writer.finish()
}

fn bench_decode(c: &mut Criterion) {
    let registry = registry();
    let text = r#"{"@type":"Event","id":42,"source":"sensor-7","level":"warning","flagged":true}"#;
    let binary = binary_payload();
    let options = DecodeOptions::new();

    let mut group = c.benchmark_group("decode");
    group.bench_function("text_redirected", |b| {
        b.iter(|| {
            let event = from_str_as::<Event>(&registry, black_box(text), "Message", options)
                .expect("decode failed");
            black_box(event);
        });
    });
    group.bench_function("binary_redirected", |b| {
        b.iter(|| {
            let event =
                from_slice_as::<Event>(&registry, black_box(&binary), "Message", options)
                    .expect("decode failed");
            black_box(event);
        });
    });
    group.bench_function("text_direct", |b| {
        b.iter(|| {
            let event = from_str_as::<Event>(&registry, black_box(text), "Event", options)
                .expect("decode failed");
            black_box(event);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
