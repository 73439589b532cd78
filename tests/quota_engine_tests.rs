//! Tests de integración del motor de cuotas
//!
//! Ejercitan el ledger completo contra el store en memoria: tabla de
//! asignaciones, deducción atómica, cruces de umbral, reset y barrido
//! mensual, incluyendo las propiedades de concurrencia.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use fuel_quota_system::models::quota::{NewQuotaPeriod, QuotaPeriod};
use fuel_quota_system::models::vehicle::{FuelType, OwnerContact, Vehicle};
use fuel_quota_system::repositories::memory::{MemoryQuotaStore, MemoryVehicleProvider};
use fuel_quota_system::repositories::QuotaStore;
use fuel_quota_system::services::notification_service::{NotificationGateway, QuotaNotification};
use fuel_quota_system::services::quota_reset_sweep::{QuotaResetSweep, SweepState};
use fuel_quota_system::services::quota_service::{DispenseOutcome, QuotaService};
use fuel_quota_system::services::threshold_monitor::QuotaWarningLevel;
use fuel_quota_system::utils::errors::{AppError, AppResult};

/// Gateway que registra cada notificación en lugar de enviarla
struct RecordingGateway {
    events: Mutex<Vec<QuotaNotification>>,
    deliver: bool,
}

impl RecordingGateway {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            deliver: true,
        }
    }

    fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            deliver: false,
        }
    }

    async fn events(&self) -> Vec<QuotaNotification> {
        self.events.lock().await.clone()
    }

    async fn warning_levels(&self) -> Vec<QuotaWarningLevel> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                QuotaNotification::LowQuotaWarning { level, .. } => Some(*level),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn notify(&self, _contact: &OwnerContact, notification: QuotaNotification) -> bool {
        self.events.lock().await.push(notification);
        self.deliver
    }
}

/// Store que falla la rotación para un vehículo marcado (para aislar fallas
/// del barrido) y delega todo lo demás en el store en memoria
struct FailingStore {
    inner: MemoryQuotaStore,
    fail_vehicle: Uuid,
}

#[async_trait]
impl QuotaStore for FailingStore {
    async fn find_active(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        self.inner.find_active(vehicle_id, fuel_type, now).await
    }

    async fn rotate_period(
        &self,
        new_period: NewQuotaPeriod,
        now: DateTime<Utc>,
        supersede_active: bool,
    ) -> AppResult<QuotaPeriod> {
        if new_period.vehicle_id == self.fail_vehicle {
            return Err(AppError::Internal("simulated storage outage".to_string()));
        }
        self.inner
            .rotate_period(new_period, now, supersede_active)
            .await
    }

    async fn deduct_if_sufficient(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        self.inner
            .deduct_if_sufficient(vehicle_id, fuel_type, amount, now)
            .await
    }
}

/// Store lento para observar el barrido mientras corre
struct SlowStore {
    inner: MemoryQuotaStore,
    delay: std::time::Duration,
}

#[async_trait]
impl QuotaStore for SlowStore {
    async fn find_active(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        self.inner.find_active(vehicle_id, fuel_type, now).await
    }

    async fn rotate_period(
        &self,
        new_period: NewQuotaPeriod,
        now: DateTime<Utc>,
        supersede_active: bool,
    ) -> AppResult<QuotaPeriod> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .rotate_period(new_period, now, supersede_active)
            .await
    }

    async fn deduct_if_sufficient(
        &self,
        vehicle_id: Uuid,
        fuel_type: FuelType,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<Option<QuotaPeriod>> {
        self.inner
            .deduct_if_sufficient(vehicle_id, fuel_type, amount, now)
            .await
    }
}

fn make_vehicle(vehicle_type: &str, fuel_type: FuelType, engine_cc: Option<i64>) -> Vehicle {
    Vehicle {
        id: Uuid::new_v4(),
        registration_number: format!("TST-{}", &Uuid::new_v4().to_string()[..4]),
        vehicle_type: vehicle_type.to_string(),
        fuel_type,
        engine_capacity: engine_cc.map(Decimal::from),
        owner: OwnerContact {
            phone_number: Some("0771234567".to_string()),
            email: Some("owner@example.com".to_string()),
        },
        created_at: Utc::now(),
    }
}

fn build_service(
    store: Arc<dyn QuotaStore>,
    gateway: Arc<RecordingGateway>,
) -> Arc<QuotaService> {
    Arc::new(QuotaService::new(store, gateway))
}

fn liters(n: i64) -> Decimal {
    Decimal::from(n)
}

// --- Asignaciones ---

#[tokio::test]
async fn lazy_creation_uses_allocation_table() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store.clone(), gateway);

    let scenarios = vec![
        (make_vehicle("Car", FuelType::Petrol, Some(2000)), 80),
        (make_vehicle("Car", FuelType::Petrol, Some(1500)), 60),
        (make_vehicle("Motorcycle", FuelType::Petrol, None), 20),
        (make_vehicle("Bus", FuelType::Diesel, None), 200),
        (make_vehicle("Car", FuelType::Diesel, None), 80),
        (make_vehicle("Tractor", FuelType::Diesel, None), 80),
    ];

    for (vehicle, expected) in scenarios {
        let period = service
            .current_period(&vehicle, vehicle.fuel_type)
            .await
            .unwrap();
        assert_eq!(period.allocated_quota, liters(expected));
        assert_eq!(period.remaining_quota, liters(expected));
    }
}

#[tokio::test]
async fn current_period_is_idempotent_under_concurrency() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store.clone(), gateway);
    let vehicle = make_vehicle("Car", FuelType::Petrol, None);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        let vehicle = vehicle.clone();
        handles.push(tokio::spawn(async move {
            service
                .current_period(&vehicle, FuelType::Petrol)
                .await
                .unwrap()
                .id
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "exactly one record must result");
    assert_eq!(store.history_len(vehicle.id, FuelType::Petrol).await, 1);
}

// --- Deducción ---

#[tokio::test]
async fn deduct_returns_before_and_after_balances() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    let vehicle = make_vehicle("Car", FuelType::Petrol, None);

    let outcome = service
        .deduct(&vehicle, FuelType::Petrol, liters(15))
        .await
        .unwrap();

    match outcome {
        DispenseOutcome::Dispensed {
            quota_before,
            quota_after,
            warning,
            ..
        } => {
            assert_eq!(quota_before, liters(60));
            assert_eq!(quota_after, liters(45));
            assert_eq!(warning, None);
        }
        other => panic!("expected successful dispense, got {:?}", other),
    }

    assert_eq!(
        service
            .remaining_balance(&vehicle, FuelType::Petrol)
            .await
            .unwrap(),
        liters(45)
    );
}

#[tokio::test]
async fn insufficient_balance_leaves_remaining_unchanged() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    let vehicle = make_vehicle("Motorcycle", FuelType::Petrol, None);

    let outcome = service
        .deduct(&vehicle, FuelType::Petrol, liters(25))
        .await
        .unwrap();

    match outcome {
        DispenseOutcome::InsufficientBalance { remaining } => {
            assert_eq!(remaining, liters(20));
        }
        other => panic!("expected insufficient balance, got {:?}", other),
    }

    // Todo-o-nada: el saldo no se tocó
    assert_eq!(
        service
            .remaining_balance(&vehicle, FuelType::Petrol)
            .await
            .unwrap(),
        liters(20)
    );
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    let vehicle = make_vehicle("Car", FuelType::Petrol, None);

    let result = service.deduct(&vehicle, FuelType::Petrol, liters(0)).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let result = service.deduct(&vehicle, FuelType::Petrol, liters(-5)).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn concurrent_deductions_never_overdraw() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    // Auto naftero: 60L asignados
    let vehicle = make_vehicle("Car", FuelType::Petrol, None);

    let mut handles = Vec::new();
    for _ in 0..30 {
        let service = service.clone();
        let vehicle = vehicle.clone();
        handles.push(tokio::spawn(async move {
            service.deduct(&vehicle, FuelType::Petrol, liters(5)).await
        }));
    }

    let mut successes = 0i64;
    for handle in handles {
        if let DispenseOutcome::Dispensed { .. } = handle.await.unwrap().unwrap() {
            successes += 1;
        }
    }

    // La suma de deducciones exitosas nunca supera lo asignado
    assert!(successes * 5 <= 60, "overdraft: {} x 5L > 60L", successes);

    let remaining = service
        .remaining_balance(&vehicle, FuelType::Petrol)
        .await
        .unwrap();
    assert_eq!(remaining, liters(60 - successes * 5));
    assert!(remaining >= Decimal::ZERO);
}

// --- Umbrales ---

#[tokio::test]
async fn threshold_warnings_fire_exactly_once_per_crossing() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway.clone());
    let vehicle = make_vehicle("Car", FuelType::Petrol, None);

    // Saldo restante: 100% -> 85% -> 75% -> 65% -> 15% -> 5% (de 60L)
    for amount in [9, 6, 6, 30, 6] {
        service
            .deduct(&vehicle, FuelType::Petrol, liters(amount))
            .await
            .unwrap();
    }

    let warnings = gateway.warning_levels().await;
    assert_eq!(
        warnings,
        vec![QuotaWarningLevel::Low, QuotaWarningLevel::Critical],
        "exactly one low and one critical crossing"
    );
}

#[tokio::test]
async fn critical_suppresses_low_when_both_crossed_in_one_step() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway.clone());
    let vehicle = make_vehicle("Car", FuelType::Petrol, None);

    // 100% -> 5% en una sola deducción: cruza 20% y 10% a la vez
    service
        .deduct(&vehicle, FuelType::Petrol, liters(57))
        .await
        .unwrap();

    let warnings = gateway.warning_levels().await;
    assert_eq!(warnings, vec![QuotaWarningLevel::Critical]);
}

// --- Reset ---

#[tokio::test]
async fn reset_restores_full_allocation_and_keeps_history() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store.clone(), gateway.clone());
    let vehicle = make_vehicle("Car", FuelType::Petrol, Some(2000));

    service
        .deduct(&vehicle, FuelType::Petrol, liters(50))
        .await
        .unwrap();

    let period = service
        .reset_period(&vehicle, FuelType::Petrol)
        .await
        .unwrap();
    assert_eq!(period.allocated_quota, liters(80));
    assert_eq!(period.remaining_quota, liters(80));

    let balance = service.get_balance(&vehicle, FuelType::Petrol).await.unwrap();
    assert_eq!(balance.remaining_quota, liters(80));
    assert_eq!(balance.allocated_quota, liters(80));
    assert_eq!(balance.used_quota, Decimal::ZERO);

    // El registro anterior queda retenido como historial, no se borra
    assert_eq!(store.history_len(vehicle.id, FuelType::Petrol).await, 2);

    // Y se emitió el aviso de nueva asignación
    let events = gateway.events().await;
    assert!(events.iter().any(|event| matches!(
        event,
        QuotaNotification::NewAllocation { allocated_liters, .. }
            if *allocated_liters == liters(80)
    )));
}

#[tokio::test]
async fn notification_failure_does_not_roll_back_reset() {
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::failing());
    let service = build_service(store, gateway);
    let vehicle = make_vehicle("Car", FuelType::Diesel, None);

    let period = service
        .reset_period(&vehicle, FuelType::Diesel)
        .await
        .unwrap();
    assert_eq!(period.remaining_quota, liters(80));
}

// --- Barrido mensual ---

#[tokio::test]
async fn sweep_resets_every_vehicle_and_is_idempotent_to_reinvocation() {
    let vehicles = vec![
        make_vehicle("Car", FuelType::Petrol, None),
        make_vehicle("Bus", FuelType::Diesel, None),
        make_vehicle("Motorcycle", FuelType::Petrol, None),
    ];
    let store = Arc::new(MemoryQuotaStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    let provider = Arc::new(MemoryVehicleProvider::new(vehicles.clone()));
    let sweep = QuotaResetSweep::new(service.clone(), provider, 2);

    // Consumir algo antes del primer barrido
    service
        .deduct(&vehicles[0], FuelType::Petrol, liters(30))
        .await
        .unwrap();

    let summary = sweep.run_monthly_sweep().await.unwrap();
    assert_eq!(
        (summary.total, summary.succeeded, summary.failed),
        (3, 3, 0)
    );
    assert!(!summary.cancelled);
    assert_eq!(sweep.state().await, SweepState::Completed(summary.clone()));

    for vehicle in &vehicles {
        let balance = service
            .get_balance(vehicle, vehicle.fuel_type)
            .await
            .unwrap();
        assert_eq!(balance.remaining_quota, balance.allocated_quota);
    }

    // Reinvocar dentro del mismo mes es otro reset forzado válido
    service
        .deduct(&vehicles[1], FuelType::Diesel, liters(120))
        .await
        .unwrap();
    let summary = sweep.run_monthly_sweep().await.unwrap();
    assert_eq!(summary.succeeded, 3);

    let balance = service
        .get_balance(&vehicles[1], FuelType::Diesel)
        .await
        .unwrap();
    assert_eq!(balance.remaining_quota, liters(200));
}

#[tokio::test]
async fn sweep_isolates_per_vehicle_failures() {
    let vehicles = vec![
        make_vehicle("Car", FuelType::Petrol, None),
        make_vehicle("Car", FuelType::Diesel, None),
        make_vehicle("Lorry", FuelType::Diesel, None),
    ];
    let store = Arc::new(FailingStore {
        inner: MemoryQuotaStore::new(),
        fail_vehicle: vehicles[1].id,
    });
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    let provider = Arc::new(MemoryVehicleProvider::new(vehicles.clone()));
    let sweep = QuotaResetSweep::new(service.clone(), provider, 3);

    let summary = sweep.run_monthly_sweep().await.unwrap();
    assert_eq!(
        (summary.total, summary.succeeded, summary.failed),
        (3, 2, 1)
    );
    assert!(matches!(
        sweep.state().await,
        SweepState::CompletedWithFailures(_)
    ));

    // Los demás vehículos quedaron reseteados igual
    let balance = service
        .get_balance(&vehicles[2], FuelType::Diesel)
        .await
        .unwrap();
    assert_eq!(balance.remaining_quota, liters(200));
}

#[tokio::test]
async fn sweep_rejects_double_fire_within_same_tick() {
    let vehicles = vec![
        make_vehicle("Car", FuelType::Petrol, None),
        make_vehicle("Car", FuelType::Diesel, None),
    ];
    let store = Arc::new(SlowStore {
        inner: MemoryQuotaStore::new(),
        delay: std::time::Duration::from_millis(200),
    });
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    let provider = Arc::new(MemoryVehicleProvider::new(vehicles));
    let sweep = Arc::new(QuotaResetSweep::new(service, provider, 1));

    let first = {
        let sweep = sweep.clone();
        tokio::spawn(async move { sweep.run_monthly_sweep().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Segundo disparo dentro del mismo tick: rechazado
    let second = sweep.run_monthly_sweep().await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.succeeded, 2);
}

#[tokio::test]
async fn sweep_supports_cooperative_cancellation() {
    let vehicles: Vec<Vehicle> = (0..5)
        .map(|_| make_vehicle("Car", FuelType::Petrol, None))
        .collect();
    let store = Arc::new(SlowStore {
        inner: MemoryQuotaStore::new(),
        delay: std::time::Duration::from_millis(100),
    });
    let gateway = Arc::new(RecordingGateway::new());
    let service = build_service(store, gateway);
    let provider = Arc::new(MemoryVehicleProvider::new(vehicles));
    let sweep = Arc::new(QuotaResetSweep::new(service, provider, 1));

    let handle = {
        let sweep = sweep.clone();
        tokio::spawn(async move { sweep.run_monthly_sweep().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    sweep.request_cancel();

    let summary = handle.await.unwrap().unwrap();
    assert!(summary.cancelled);
    assert!(summary.succeeded + summary.failed < summary.total);
    assert_eq!(summary.total, 5);
}
