//! Redis-backed integration tests
//!
//! Run with `cargo test -p sonic-utilities-test -- --ignored` on a host
//! with Docker.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sonic_chassis_modules::tables::{fields, CFG_CHASSIS_MODULE_TABLE_NAME};
use sonic_chassis_modules::{
    AdminStatus, ChassisModules, FabricLinkReconciler, ModuleName, ReconcileOutcome,
    TransitionGuard, TransitionOutcome,
};
use sonic_utilities_common::{field_values, DbId, PlatformInfo, TableStore};
use sonic_utilities_test::fixtures::{fabric_fixtures, module_fixtures, ChassisScenario};
use sonic_utilities_test::{
    unix_time, CommandVerifier, FixedClock, RecordingServiceControl, RedisTestEnv, StoreVerifier,
};

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_redis_store_record_round_trip() {
    let env = RedisTestEnv::start().await.expect("Failed to start Redis");
    let store = env.store(DbId::ConfigDb).await.expect("Failed to connect");

    store
        .set_entry(
            CFG_CHASSIS_MODULE_TABLE_NAME,
            "DPU0",
            Some(field_values! {"admin_status" => "up", "state_transition_in_progress" => "True"}),
        )
        .await
        .unwrap();
    // Replacing drops fields missing from the new record.
    store
        .set_entry(
            CFG_CHASSIS_MODULE_TABLE_NAME,
            "DPU0",
            Some(field_values! {"admin_status" => "down"}),
        )
        .await
        .unwrap();

    let mut raw = env.hgetall(DbId::ConfigDb, "CHASSIS_MODULE|DPU0").await.unwrap();
    raw.sort();
    assert_eq!(raw, vec![("admin_status".to_string(), "down".to_string())]);

    store
        .set_entry(CFG_CHASSIS_MODULE_TABLE_NAME, "DPU0", None)
        .await
        .unwrap();
    assert_eq!(store.get_entry(CFG_CHASSIS_MODULE_TABLE_NAME, "DPU0").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_databases_are_isolated() {
    let env = RedisTestEnv::start().await.expect("Failed to start Redis");
    env.hset(DbId::ChassisStateDb, "CHASSIS_FABRIC_ASIC_TABLE|asic0", "name", "FABRIC-CARD0")
        .await
        .unwrap();

    let config_db = env.store(DbId::ConfigDb).await.unwrap();
    let chassis_db = env.store(DbId::ChassisStateDb).await.unwrap();

    assert!(config_db.keys("CHASSIS_FABRIC_ASIC_TABLE*").await.unwrap().is_empty());
    assert_eq!(
        chassis_db
            .hget("CHASSIS_FABRIC_ASIC_TABLE|asic0", "name")
            .await
            .unwrap()
            .as_deref(),
        Some("FABRIC-CARD0")
    );

    env.flush_all().await.unwrap();
    assert!(env.keys(DbId::ChassisStateDb, "*").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_smartswitch_transition_over_redis() {
    let env = RedisTestEnv::start().await.expect("Failed to start Redis");
    let config_db = Arc::new(env.store(DbId::ConfigDb).await.unwrap());
    let clock = Arc::new(FixedClock::new(unix_time(1_735_732_800)));
    let guard = TransitionGuard::new(config_db.clone(), true).with_clock(clock);
    let dpu = ModuleName::parse("DPU0").unwrap();

    let first = guard.request_transition(&dpu, AdminStatus::Up).await.unwrap();
    let second = guard.request_transition(&dpu, AdminStatus::Down).await.unwrap();
    assert_eq!(first, TransitionOutcome::Applied);
    assert_eq!(second, TransitionOutcome::RejectedDuplicateInProgress);

    StoreVerifier::new(config_db.as_ref())
        .assert_fields(
            CFG_CHASSIS_MODULE_TABLE_NAME,
            "DPU0",
            &[
                (fields::ADMIN_STATUS, "up"),
                (fields::STATE_TRANSITION_IN_PROGRESS, "True"),
                (fields::TRANSITION_START_TIME, "2025-01-01T12:00:00.000000"),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_fabric_card_shutdown_over_redis() {
    let env = RedisTestEnv::start().await.expect("Failed to start Redis");
    let config_db = Arc::new(env.store(DbId::ConfigDb).await.unwrap());
    let chassis_db = Arc::new(env.store(DbId::ChassisStateDb).await.unwrap());

    ChassisScenario::new("fabric card over redis")
        .add_module(module_fixtures::admin_down("LINE-CARD0"))
        .add_asics(fabric_fixtures::bound_asics("FABRIC-CARD1", &[6, 7]))
        .add_asics(fabric_fixtures::bound_asics("FABRIC-CARD2", &[8]))
        .write(config_db.as_ref(), chassis_db.as_ref())
        .await
        .unwrap();

    let services = Arc::new(RecordingServiceControl::new());
    let platform = PlatformInfo::standard();
    let guard = TransitionGuard::new(config_db.clone(), platform.is_smartswitch());
    let reconciler = FabricLinkReconciler::new(guard, chassis_db.clone(), services.clone());
    let modules = ChassisModules::new(platform, config_db.clone()).with_fabric_reconciler(reconciler);

    let card = modules.resolve_module("FABRIC-CARD1").unwrap();
    let report = modules.shutdown(&card).await.unwrap();
    assert_eq!(report.fabric, Some(ReconcileOutcome::Restarted { asics: vec![6, 7] }));

    let mut remaining = env
        .keys(DbId::ChassisStateDb, "CHASSIS_FABRIC_ASIC_TABLE|*")
        .await
        .unwrap();
    remaining.sort();
    assert_eq!(remaining, vec!["CHASSIS_FABRIC_ASIC_TABLE|asic8"]);

    let commands = CommandVerifier::new(services.commands());
    commands.assert_command_executed("start swss@6.service").unwrap();
    commands.assert_command_executed("start swss@7.service").unwrap();
    commands.assert_command_not_executed("swss@8").unwrap();

    StoreVerifier::new(config_db.as_ref())
        .assert_field_value(CFG_CHASSIS_MODULE_TABLE_NAME, "FABRIC-CARD1", fields::ADMIN_STATUS, "down")
        .await
        .unwrap();
}
