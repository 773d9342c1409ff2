//! Demo catalog and run history for `serve --seed`.

use backend::models::{
    ExecutionMethod, ModelType, RunLogEntry, RunStatus, RunTarget, TaskDetail,
};
use backend::MemoryBackend;
use chrono::{Duration, Utc};
use tracing::info;

const SYNC_TASKS: &[(i64, &str, &str, &str)] = &[
    (1, "orders import", "erp.orders", "ods.orders"),
    (2, "customers import", "crm.customers", "ods.customers"),
    (3, "inventory snapshot", "wms.stock", "ods.stock"),
    (4, "payments import", "pay.transactions", "ods.payments"),
];

const PROCESS_TASKS: &[(i64, &str)] = &[
    (101, "clean orders"),
    (102, "join customers and orders"),
    (103, "daily revenue report"),
];

/// Fill `store` with a small catalog and a few days of run history.
pub fn seed_demo(store: &MemoryBackend) {
    for &(id, name, source, target) in SYNC_TASKS {
        store.add_task(
            ModelType::Sync,
            TaskDetail {
                id,
                name: name.to_owned(),
                source_table: Some(source.to_owned()),
                target_table: Some(target.to_owned()),
            },
        );
    }
    for &(id, name) in PROCESS_TASKS {
        store.add_task(
            ModelType::Process,
            TaskDetail { id, name: name.to_owned(), source_table: None, target_table: None },
        );
    }

    let now = Utc::now();
    for day in 1..=3 {
        let start = now - Duration::days(day);
        for &(id, ..) in SYNC_TASKS {
            let status = if (id + day) % 4 == 0 { RunStatus::Failure } else { RunStatus::Success };
            store.push_log(
                RunTarget::SyncTask(id),
                RunLogEntry {
                    id: 0,
                    status,
                    start_time: start,
                    end_time: Some(start + Duration::minutes(3)),
                    sync_count: Some((id as u64) * 1_000 + day as u64 * 17),
                    sync_method: ExecutionMethod::Scheduled,
                },
            );
        }
        for &(id, _) in PROCESS_TASKS {
            store.push_log(
                RunTarget::ProcessTask(id),
                RunLogEntry {
                    id: 0,
                    status: RunStatus::Success,
                    start_time: start + Duration::minutes(10),
                    end_time: Some(start + Duration::minutes(12)),
                    sync_count: None,
                    sync_method: ExecutionMethod::Scheduled,
                },
            );
        }
    }

    info!(
        sync_tasks = SYNC_TASKS.len(),
        process_tasks = PROCESS_TASKS.len(),
        "demo data seeded"
    );
}
