use credhive::hash_decrypt::{decrypt_rc4_hash, derive_rid_keys, HashKind};
use criterion::{criterion_group, criterion_main, Criterion};

const RID_500: [u8; 4] = [0xF4, 0x01, 0x00, 0x00];

fn decrypt_known_nt_hash() {
    let syskey = hex::decode("3d212ce8a2da8343bdad1ef2cfb6b31c").unwrap();
    let encrypted = hex::decode("ed928792783b692c213749bcdbe31af5").unwrap();
    decrypt_rc4_hash(&RID_500, &syskey, &encrypted, HashKind::Nt).unwrap();
}

fn derive_des_keys() {
    derive_rid_keys(&RID_500).unwrap();
}

pub fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash decryption");
    group
        .sample_size(1000)
        .measurement_time(std::time::Duration::from_secs(5))
        .bench_function("decrypt rc4 nt hash", |b| b.iter(decrypt_known_nt_hash))
        .bench_function("derive rid des keys", |b| b.iter(derive_des_keys));
    group.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
