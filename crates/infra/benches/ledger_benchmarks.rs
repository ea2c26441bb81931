use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use chrono::Duration;
use rust_decimal::Decimal;
use tokio::runtime::Runtime;

use ledgerbank_auth::{Argon2PasswordHasher, JwtTokenIssuer, LockoutPolicy};
use ledgerbank_banking::{Account, AccountType};
use ledgerbank_core::{Amount, SystemClock};
use ledgerbank_infra::config::SecurityConfig;
use ledgerbank_infra::seed::seed_roles;
use ledgerbank_infra::services::LedgerServices;
use ledgerbank_infra::store::InMemoryLedgerStore;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn amount(value: i64) -> Amount {
    Amount::new(Decimal::new(value, 2)).expect("positive amount")
}

/// Fresh services with two approved, funded customers.
async fn setup() -> (LedgerServices, Account, Account) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(SystemClock);
    let security = SecurityConfig {
        jwt_secret: "bench".to_string(),
        token_ttl: Duration::minutes(60),
        lockout: LockoutPolicy::default(),
    };
    let services = LedgerServices::new(
        store.clone(),
        clock.clone(),
        Arc::new(Argon2PasswordHasher::new()),
        Arc::new(JwtTokenIssuer::new(b"bench", clock)),
        &security,
    );
    seed_roles(store.as_ref()).await.expect("seed roles");

    let mut accounts = Vec::new();
    for name in ["alice", "bob"] {
        let user = services
            .auth
            .register(name, &format!("{name}@example.com"), "password1")
            .await
            .expect("register");
        let account = services
            .accounts
            .create(user.id, AccountType::Current)
            .await
            .expect("create account");
        services.accounts.approve(account.id).await.expect("approve");
        let funded = services
            .accounts
            .deposit(name, amount(100_000_000))
            .await
            .expect("fund");
        accounts.push(funded.account);
    }
    let bob = accounts.pop().expect("bob");
    let alice = accounts.pop().expect("alice");
    (services, alice, bob)
}

fn bench_single_transfer_latency(c: &mut Criterion) {
    let rt = runtime();
    let (services, _alice, bob) = rt.block_on(setup());

    let mut group = c.benchmark_group("transfer_latency");
    group.sample_size(500);
    group.bench_function("in_memory_transfer", |b| {
        b.iter(|| {
            rt.block_on(services.accounts.transfer(
                black_box("alice"),
                bob.account_number.as_str(),
                amount(1),
            ))
            .expect("transfer")
        })
    });
    group.finish();
}

fn bench_concurrent_transfer_throughput(c: &mut Criterion) {
    let rt = runtime();
    let (services, alice, bob) = rt.block_on(setup());

    let mut group = c.benchmark_group("transfer_throughput");
    for concurrency in [1usize, 8, 32] {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    rt.block_on(async {
                        let mut tasks = Vec::with_capacity(concurrency);
                        for i in 0..concurrency {
                            let accounts = services.accounts.clone();
                            let (from, to) = if i % 2 == 0 {
                                ("alice", bob.account_number.clone())
                            } else {
                                ("bob", alice.account_number.clone())
                            };
                            tasks.push(tokio::spawn(async move {
                                accounts.transfer(from, to.as_str(), amount(1)).await
                            }));
                        }
                        for task in tasks {
                            task.await.expect("join").expect("transfer");
                        }
                    })
                })
            },
        );
    }
    group.finish();
}

fn bench_history_query(c: &mut Criterion) {
    let rt = runtime();
    let (services, _alice, bob) = rt.block_on(setup());
    rt.block_on(async {
        for _ in 0..1_000 {
            services
                .accounts
                .transfer("alice", bob.account_number.as_str(), amount(1))
                .await
                .expect("transfer");
        }
    });

    c.bench_function("history_for_user_1000_rows", |b| {
        b.iter(|| {
            rt.block_on(services.ledger.history_for_user(black_box("alice"), None, None))
                .expect("history")
        })
    });
}

criterion_group!(
    benches,
    bench_single_transfer_latency,
    bench_concurrent_transfer_throughput,
    bench_history_query
);
criterion_main!(benches);
