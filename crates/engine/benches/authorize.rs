use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use itsm_auth::{OverrideRule, Permission, Principal};
use itsm_core::{ResourceRef, TenantId};
use itsm_engine::{Engine, InMemoryBackend};
use itsm_infra::EngineConfig;
use itsm_tenancy::NewTenant;
use tokio::runtime::Runtime;

fn setup(rt: &Runtime) -> (Engine, InMemoryBackend, TenantId) {
    rt.block_on(async {
        let (engine, backend) = Engine::in_memory(&EngineConfig::default()).unwrap();
        let tenant = engine
            .provisioner()
            .create(NewTenant::new("acme", "Acme"))
            .await
            .unwrap()
            .id;

        engine.memberships().assign("root", "super_admin", None).await.unwrap();
        engine
            .memberships()
            .assign("alice", "analyst", Some(&tenant))
            .await
            .unwrap();

        let incidents = backend.resources("incident").unwrap();
        for i in 0..1_000 {
            incidents
                .insert(format!("INC-{i}"), Some("alice"), Some("IT"))
                .unwrap();
        }
        incidents.insert("INC-X", Some("carol"), Some("HR")).unwrap();

        for i in 0..50 {
            let rule = OverrideRule::allow("incidents.update", ResourceRef::new("incident", format!("INC-{i}")))
                .for_users([format!("user-{i}")]);
            engine
                .authorizer()
                .add_override_rule(&tenant, rule)
                .await
                .unwrap();
        }
        engine
            .authorizer()
            .add_override_rule(
                &tenant,
                OverrideRule::allow("incidents.update", ResourceRef::new("incident", "INC-X"))
                    .for_users(["alice"]),
            )
            .await
            .unwrap();

        (engine, backend, tenant)
    })
}

fn bench_check_paths(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (engine, _backend, tenant) = setup(&rt);
    let authz = engine.authorizer();
    let update = Permission::new("incidents.update");

    let root = Principal::new("root");
    let alice = Principal::new("alice").with_department("Finance");
    let owned = ResourceRef::new("incident", "INC-500");
    let overridden = ResourceRef::new("incident", "INC-X");

    let mut group = c.benchmark_group("authorizer_check");

    group.bench_function(BenchmarkId::new("wildcard", "global"), |b| {
        b.iter(|| rt.block_on(authz.is_allowed(black_box(&root), &update, Some(&owned), None)))
    });

    group.bench_function(BenchmarkId::new("owner", "tenant"), |b| {
        b.iter(|| {
            rt.block_on(authz.is_allowed(black_box(&alice), &update, Some(&owned), Some(&tenant)))
        })
    });

    group.bench_function(BenchmarkId::new("override", "tenant"), |b| {
        b.iter(|| {
            rt.block_on(authz.is_allowed(
                black_box(&alice),
                &update,
                Some(&overridden),
                Some(&tenant),
            ))
        })
    });

    group.bench_function(BenchmarkId::new("missing_permission", "tenant"), |b| {
        let delete = Permission::new("incidents.delete");
        b.iter(|| {
            rt.block_on(authz.is_allowed(black_box(&alice), &delete, Some(&owned), Some(&tenant)))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_check_paths);
criterion_main!(benches);
