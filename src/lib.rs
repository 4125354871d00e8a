pub mod command;
pub mod config;
pub mod data;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod results;
pub mod services;
pub mod shutdown;
pub mod signals;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{command_queue, Command, CommandReceiver, CommandSender};
pub use config::HarvesterConfig;
pub use data::{
    create_data_manager, DataManager, JsonFileDataManager, MemoryDataManager, ResultQuery,
};
pub use dispatcher::{CommandDispatcher, DispatchReport};
pub use engine::{Engine, EngineBuilder, EngineState};
pub use error::{HarvesterError, Result};
pub use results::{ResultHandler, ResultStatus, TaskResult};
pub use services::{Service, ServiceRegistry};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use signals::SignalBridge;
pub use tasks::{
    load_task_dir, Executor, ExecutorRegistry, IntervalTaskMaster, TaskMaster, TaskRegistry,
    TaskSpec,
};

#[cfg(feature = "console")]
pub use services::ControlConsole;

#[cfg(feature = "query_service")]
pub use services::{QueryService, QueryServiceBuilder};
