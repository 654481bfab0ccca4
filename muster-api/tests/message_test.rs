use async_trait::async_trait;

use muster_api::errors::LoadError;
use muster_api::{FromWorker, InitMessage, ModuleLoader, SharedMemory, Task, ToWorker, WorkerId, READY_SENTINEL};

#[test]
fn test_init_message() {
    let region = SharedMemory::new(4);
    let init = InitMessage::new(WorkerId::new(3), region.clone());

    assert_eq!(init.task, Task::Init);
    assert_eq!(init.task.to_string(), "init");
    assert_eq!(init.id, WorkerId::new(3));
    assert!(init.resource.same_region(&region));
    assert_eq!(ToWorker::Init(init).kind(), "init");
}

#[test]
fn test_ready_sentinel() {
    assert_eq!(READY_SENTINEL, "init done");
    assert_eq!(FromWorker::Ready.to_string(), READY_SENTINEL);
    assert!(FromWorker::Ready.is_ready());
    assert!(!FromWorker::Output(vec![]).is_ready());
}

#[test]
fn test_message_kinds() {
    assert_eq!(ToWorker::Job(vec![1]).kind(), "job");
    assert_eq!(ToWorker::Terminate.kind(), "terminate");

    let nack = FromWorker::Nack {
        reason: "no device".into(),
    };
    assert_eq!(nack.kind(), "nack");
    assert_eq!(nack.to_string(), "init failed: no device");
    assert_eq!(FromWorker::Output(vec![0; 3]).to_string(), "output (3 bytes)");
}

#[test]
fn test_worker_id() {
    let id = WorkerId::from(7);
    assert_eq!(id.index(), 7);
    assert_eq!(id.to_string(), "7");
    assert!(WorkerId::new(1) < WorkerId::new(2));
}

struct FixedLoader(Vec<u8>);

#[async_trait]
impl ModuleLoader for FixedLoader {
    async fn load(&self) -> Result<SharedMemory, LoadError> {
        if self.0.is_empty() {
            return Err(LoadError::Unavailable("empty image".into()));
        }
        Ok(SharedMemory::from_image(&self.0))
    }
}

#[tokio::test]
async fn test_module_loader_is_object_safe() {
    let loaders: Vec<Box<dyn ModuleLoader>> = vec![Box::new(FixedLoader(vec![4, 2])), Box::new(FixedLoader(vec![]))];

    let region = loaders[0].load().await.unwrap();
    assert_eq!(region.snapshot(), vec![4, 2]);

    let err = loaders[1].load().await.unwrap_err();
    assert_eq!(err.to_string(), "Resource image unavailable: empty image");
}
