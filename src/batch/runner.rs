//! # 批量执行器
//!
//! 将校验过的 `BatchConfig` 展开为批处理项，在后台线程中并行执行，
//! 并向调用者提供实时的进度与结果查询。
//!
//! ## 功能
//! - 基于 rayon 线程池的无序并行处理
//! - 协作式取消：已开始的文件会处理完，未开始的不再派发
//! - 进度回调（单调递增的完成计数）与结束回调
//! - 处理结束后合并所有文件的插件元数据，交给各步骤的 `post_load`
//! - 结果汇总：处理数、失败数、日志、OK/FAIL 列表、稳定的状态快照
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 调用
//! - 使用 `batch/item.rs` 执行单个文件
//! - 使用 `rayon` 进行并行计算

use super::config::BatchConfig;
use super::item::BatchItem;
use super::naming::FileNameConverter;
use crate::error::{BatchError, Result};
use crate::imaging::{FileCodec, ImageCodec};
use crate::plugins::BatchInfo;
use crate::utils::report::ItemReport;

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// 单个文件在运行期间的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    NotComputed,
    Succeeded,
    Failed,
}

/// 运行期间的通知接收者
///
/// 回调在工作线程中触发。
pub trait BatchObserver: Send + Sync {
    /// 又有一个文件处理完成；`completed` 单调递增
    fn on_progress(&self, _completed: usize) {}

    /// 所有文件（或取消前已开始的文件）处理完毕
    fn on_finished(&self) {}
}

/// 协作式取消标记，可在任意线程中克隆和触发
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

type ItemList = Arc<Vec<Mutex<BatchItem>>>;

/// 批量执行器
pub struct BatchRunner {
    config: Arc<BatchConfig>,
    codec: Arc<dyn ImageCodec>,
    /// 并行作业数
    jobs: usize,
    items: ItemList,
    cancel: CancelToken,
    observer: Option<Arc<dyn BatchObserver>>,
    worker: Option<JoinHandle<()>>,
    results: Vec<ItemStatus>,
}

impl BatchRunner {
    /// 创建执行器；配置无效时返回错误
    pub fn new(config: BatchConfig, jobs: usize) -> Result<Self> {
        config.validate()?;
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };

        Ok(Self {
            config: Arc::new(config),
            codec: Arc::new(FileCodec),
            jobs,
            items: Arc::new(Vec::new()),
            cancel: CancelToken::default(),
            observer: None,
            worker: None,
            results: Vec::new(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 为每个输入文件生成一个批处理项
    ///
    /// 输出路径与前面某一项相同的批处理项直接记为失败，不会被派发。
    fn init(&self) -> Result<Vec<Mutex<BatchItem>>> {
        let converter = FileNameConverter::new(self.config.pattern())?;
        let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();

        let items = self
            .config
            .files()
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let output = self.output_path_for(&converter, input, index);
                debug!(index, input = %input.display(), output = %output.display(), "batch item");

                let first = claimed.get(&output).copied();
                if first.is_none() {
                    claimed.insert(output.clone(), input.as_path());
                }

                let mut item = BatchItem::new(
                    input,
                    output,
                    Arc::clone(self.config.steps()),
                    Arc::clone(&self.codec),
                )
                .with_mode(self.config.mode())
                .with_delete_original(self.config.delete_original())
                .with_compression(self.config.compression());
                if let Some(first) = first {
                    warn!(input = %input.display(), output = %item.output().display(), "output already claimed");
                    item.mark_duplicate(first);
                }
                Mutex::new(item)
            })
            .collect();

        Ok(items)
    }

    fn output_path_for(&self, converter: &FileNameConverter, input: &Path, index: usize) -> PathBuf {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out_name = converter.convert(&file_name, index);

        let dir = if self.config.input_dir_is_output_dir() {
            input.parent().unwrap_or_else(|| Path::new("")).to_path_buf()
        } else {
            self.config.output_dir().to_path_buf()
        };
        dir.join(out_name)
    }

    /// 开始一次新的运行
    ///
    /// 上一次运行尚未结束时先阻塞等待，然后丢弃旧的批处理项。
    /// 处理在后台线程中进行，本函数立即返回。
    pub fn compute(&mut self) -> Result<()> {
        self.wait_for_finished();

        let items = self.init()?;
        self.results = vec![ItemStatus::NotComputed; items.len()];
        self.items = Arc::new(items);
        self.cancel.reset();

        let steps = Arc::clone(self.config.steps());
        for step in steps.iter() {
            step.pre_load();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()?;

        info!(items = self.items.len(), jobs = self.jobs, "batch started");

        let items = Arc::clone(&self.items);
        let cancel = self.cancel.clone();
        let observer = self.observer.clone();

        let handle = thread::Builder::new()
            .name("imgbatch-runner".to_string())
            .spawn(move || {
                let batch_info = pool.install(|| process_items(&items, &cancel, observer.as_deref()));

                for step in steps.iter() {
                    step.post_load(&batch_info);
                }

                info!(cancelled = cancel.is_cancelled(), "batch finished");
                if let Some(observer) = observer {
                    observer.on_finished();
                }
            })
            .map_err(|e| BatchError::Other(format!("could not start batch thread: {}", e)))?;

        self.worker = Some(handle);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// 阻塞直到当前运行结束
    pub fn wait_for_finished(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("batch thread panicked");
            }
        }
    }

    /// 请求取消：尚未开始的文件不再处理
    pub fn cancel(&self) {
        debug!("batch cancel requested");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// 已处理（无论成败）的文件数
    pub fn num_processed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| peek(item, |i| i.was_processed()).unwrap_or(false))
            .count()
    }

    /// 失败的文件数
    pub fn num_failures(&self) -> usize {
        self.items
            .iter()
            .filter(|item| peek(item, |i| i.was_processed() && i.has_failed()).unwrap_or(false))
            .count()
    }

    /// 所有已处理文件的日志，每个文件之后跟一个空行
    pub fn log(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for item in self.items.iter() {
            if let Some(item_lines) = peek(item, |i| i.was_processed().then(|| i.log_lines())).flatten() {
                lines.extend(item_lines);
                lines.push(String::new());
            }
        }
        lines
    }

    /// 每个已处理文件一行：`<输入>\t[OK]` 或 `<输入>\t[FAIL]`
    pub fn result_list(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| {
                peek(item, |i| {
                    i.was_processed().then(|| {
                        let tag = if i.has_failed() { "[FAIL]" } else { "[OK]" };
                        format!("{}\t{}", i.input().display(), tag)
                    })
                })
                .flatten()
            })
            .collect()
    }

    /// 按索引的状态快照；已确定的状态不会被覆盖
    pub fn current_results(&mut self) -> &[ItemStatus] {
        for (status, item) in self.results.iter_mut().zip(self.items.iter()) {
            if *status != ItemStatus::NotComputed {
                continue;
            }
            *status = peek(item, |i| match (i.was_processed(), i.has_failed()) {
                (false, _) => ItemStatus::NotComputed,
                (true, false) => ItemStatus::Succeeded,
                (true, true) => ItemStatus::Failed,
            })
            .unwrap_or(ItemStatus::NotComputed);
        }
        &self.results
    }

    /// 每个文件一行的报告数据（用于结果表格与 CSV）
    pub fn item_reports(&self) -> Vec<ItemReport> {
        self.items
            .iter()
            .zip(self.config.files())
            .enumerate()
            .map(|(index, (item, input))| {
                peek(item, |i| ItemReport::from_item(index, i))
                    .unwrap_or_else(|| ItemReport::in_flight(index, input))
            })
            .collect()
    }
}

impl Drop for BatchRunner {
    fn drop(&mut self) {
        if self.is_running() {
            self.cancel.cancel();
        }
        self.wait_for_finished();
    }
}

// ─────────────────────────────────────────────────────────────
// 工作线程
// ─────────────────────────────────────────────────────────────

/// 并行处理所有批处理项，返回合并后的插件元数据
fn process_items(
    items: &[Mutex<BatchItem>],
    cancel: &CancelToken,
    observer: Option<&dyn BatchObserver>,
) -> Vec<BatchInfo> {
    let completed = Mutex::new(0usize);

    let collected: Vec<Vec<BatchInfo>> = items
        .par_iter()
        .filter_map(|item| {
            if cancel.is_cancelled() {
                return None;
            }

            let mut item = lock(item);
            if !item.was_processed() {
                if let Err(e) = item.compute() {
                    warn!("{}", e);
                    return None;
                }
            }
            let batch_info = item.batch_info().to_vec();
            drop(item);

            // 计数与通知在同一把锁下，保证通知的计数单调递增
            let mut done = lock(&completed);
            *done += 1;
            if let Some(observer) = observer {
                observer.on_progress(*done);
            }

            Some(batch_info)
        })
        .collect();

    collected.into_iter().flatten().collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 读取不在处理中的批处理项；正在处理时返回 `None`
fn peek<R>(item: &Mutex<BatchItem>, f: impl FnOnce(&BatchItem) -> R) -> Option<R> {
    match item.try_lock() {
        Ok(guard) => Some(f(&guard)),
        Err(TryLockError::Poisoned(poisoned)) => Some(f(&poisoned.into_inner())),
        Err(TryLockError::WouldBlock) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::config::OverwriteMode;
    use crate::batch::log::LogEvent;
    use crate::imaging::ImageDoc;
    use crate::steps::{BatchStep, ResizeStep, StepOutcome, TransformStep};
    use image::{Rgb, RgbImage};
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_image(path: &Path, width: u32, height: u32) {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 128]))
            .save(path)
            .unwrap();
    }

    fn half_then_rotate() -> Vec<Box<dyn BatchStep>> {
        vec![
            Box::new(ResizeStep::new(0.5).unwrap()),
            Box::new(TransformStep::new(90).unwrap()),
        ]
    }

    /// 两个输入: A.jpg (40x20), B.png (20x40)
    fn two_inputs(dir: &Path) -> Vec<PathBuf> {
        let a = dir.join("A.jpg");
        let b = dir.join("B.png");
        write_image(&a, 40, 20);
        write_image(&b, 20, 40);
        vec![a, b]
    }

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<usize>>,
        finished: AtomicUsize,
    }

    impl BatchObserver for Recorder {
        fn on_progress(&self, completed: usize) {
            self.progress.lock().unwrap().push(completed);
        }

        fn on_finished(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_resize_and_rotate_two_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let files = two_inputs(dir.path());

        let config = BatchConfig::new(files, &out, "<c:0>_out.<old>").with_steps(half_then_rotate());
        let recorder = Arc::new(Recorder::default());
        let mut runner = BatchRunner::new(config, 2)
            .unwrap()
            .with_observer(recorder.clone());

        runner.compute().unwrap();
        runner.wait_for_finished();

        assert!(!runner.is_running());
        assert_eq!(runner.num_processed(), 2);
        assert_eq!(runner.num_failures(), 0);
        assert_eq!(
            runner.current_results(),
            &[ItemStatus::Succeeded, ItemStatus::Succeeded]
        );

        // 40x20 -> 20x10 -> 旋转 -> 10x20
        assert_eq!(image::image_dimensions(out.join("A_out.jpg")).unwrap(), (10, 20));
        assert_eq!(image::image_dimensions(out.join("B_out.png")).unwrap(), (20, 10));

        assert_eq!(*recorder.progress.lock().unwrap(), vec![1, 2]);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_existing_output_is_reported_as_failure() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("B_out.png"), b"existing").unwrap();
        let files = two_inputs(dir.path());

        let config = BatchConfig::new(files, &out, "<c:0>_out.<old>")
            .with_mode(OverwriteMode::SkipExisting)
            .with_steps(half_then_rotate());
        let mut runner = BatchRunner::new(config, 2).unwrap();
        runner.compute().unwrap();
        runner.wait_for_finished();

        assert_eq!(runner.num_processed(), 2);
        assert_eq!(runner.num_failures(), 1);
        assert_eq!(fs::read(out.join("B_out.png")).unwrap(), b"existing");

        let results = runner.result_list();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|l| l.ends_with("\t[FAIL]")).count(), 1);
        assert_eq!(results.iter().filter(|l| l.ends_with("\t[OK]")).count(), 1);
        assert!(results
            .iter()
            .any(|l| l.contains("B.png") && l.ends_with("[FAIL]")));
    }

    #[test]
    fn test_log_separates_items() {
        let dir = TempDir::new().unwrap();
        let files = two_inputs(dir.path());

        let config = BatchConfig::new(files, dir.path().join("out"), "<c:0>_out.<old>")
            .with_steps(half_then_rotate());
        let mut runner = BatchRunner::new(config, 1).unwrap();
        runner.compute().unwrap();
        runner.wait_for_finished();

        let log = runner.log();
        assert_eq!(log.iter().filter(|l| l.is_empty()).count(), 2);
        assert_eq!(log.last().map(String::as_str), Some(""));
        assert!(log.iter().any(|l| l.starts_with("processing")));
    }

    #[test]
    fn test_same_dir_writes_next_to_input() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let input = sub.join("photo.png");
        write_image(&input, 8, 8);

        let config = BatchConfig::new(vec![input], "", "<c:0>_small.<old>")
            .with_input_dir_as_output(true)
            .with_steps(half_then_rotate());
        let mut runner = BatchRunner::new(config, 1).unwrap();
        runner.compute().unwrap();
        runner.wait_for_finished();

        assert_eq!(image::image_dimensions(sub.join("photo_small.png")).unwrap(), (4, 4));
    }

    /// 每张图像都要花一点时间的步骤
    struct SlowStep;

    impl BatchStep for SlowStep {
        fn name(&self) -> &str {
            "[Slow]"
        }

        fn is_active(&self) -> bool {
            true
        }

        fn compute(
            &self,
            _doc: &mut ImageDoc,
            _log: &mut Vec<LogEvent>,
            _batch_info: &mut Vec<BatchInfo>,
        ) -> StepOutcome {
            thread::sleep(Duration::from_millis(20));
            StepOutcome::Applied
        }
    }

    struct CancelOnFirst(CancelToken);

    impl BatchObserver for CancelOnFirst {
        fn on_progress(&self, _completed: usize) {
            self.0.cancel();
        }
    }

    #[test]
    fn test_cancel_stops_dispatch() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let input = dir.path().join("in.png");
        write_image(&input, 4, 4);
        let files = vec![input; 100];

        let config = BatchConfig::new(files, &out, "<c:0>_<d:3>.<old>")
            .with_steps(vec![Box::new(SlowStep)]);
        let mut runner = BatchRunner::new(config, 2).unwrap();
        let observer = Arc::new(CancelOnFirst(runner.cancel_token()));
        runner = runner.with_observer(observer);

        runner.compute().unwrap();
        runner.wait_for_finished();

        assert!(!runner.is_running());
        let processed = runner.num_processed();
        assert!(processed >= 1);
        assert!(processed < 100);
        assert_eq!(runner.num_failures(), 0);

        // 每个已处理的文件都完整写出，没有残留的备份或半成品
        let written = fs::read_dir(&out).unwrap().count();
        assert_eq!(written, processed);
        for entry in fs::read_dir(&out).unwrap() {
            let path = entry.unwrap().path();
            assert_eq!(image::image_dimensions(&path).unwrap(), (4, 4));
        }
    }

    #[test]
    fn test_current_results_are_stable() {
        let dir = TempDir::new().unwrap();
        let files = two_inputs(dir.path());

        let config = BatchConfig::new(files, dir.path().join("out"), "<c:0>_out.<old>")
            .with_steps(half_then_rotate());
        let mut runner = BatchRunner::new(config, 2).unwrap();
        assert!(runner.current_results().is_empty());

        runner.compute().unwrap();
        runner.wait_for_finished();
        let first = runner.current_results().to_vec();
        let second = runner.current_results().to_vec();

        assert_eq!(first, second);
        assert!(first.iter().all(|s| *s == ItemStatus::Succeeded));
    }

    #[test]
    fn test_second_run_replaces_items() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let files = two_inputs(dir.path());

        let config = BatchConfig::new(files, &out, "<c:0>_out.<old>")
            .with_steps(half_then_rotate());
        let mut runner = BatchRunner::new(config, 2).unwrap();

        runner.compute().unwrap();
        runner.compute().unwrap();
        runner.wait_for_finished();

        // 第二次运行时输出已存在，跳过模式下全部记为失败
        assert_eq!(runner.num_items(), 2);
        assert_eq!(runner.num_failures(), 2);
    }

    /// 记录 pre_load / post_load 调用的步骤
    struct HookStep {
        pre: Arc<AtomicUsize>,
        post: Arc<Mutex<Vec<usize>>>,
    }

    impl BatchStep for HookStep {
        fn name(&self) -> &str {
            "[Hook]"
        }

        fn is_active(&self) -> bool {
            true
        }

        fn compute(
            &self,
            doc: &mut ImageDoc,
            _log: &mut Vec<LogEvent>,
            batch_info: &mut Vec<BatchInfo>,
        ) -> StepOutcome {
            batch_info.push(BatchInfo::new("hook", doc.source.clone(), ()));
            StepOutcome::Applied
        }

        fn pre_load(&self) {
            self.pre.fetch_add(1, Ordering::SeqCst);
        }

        fn post_load(&self, batch_info: &[BatchInfo]) {
            self.post.lock().unwrap().push(batch_info.len());
        }
    }

    #[test]
    fn test_post_load_receives_all_batch_info() {
        let dir = TempDir::new().unwrap();
        let files = two_inputs(dir.path());
        let pre = Arc::new(AtomicUsize::new(0));
        let post = Arc::new(Mutex::new(Vec::new()));
        let step = HookStep {
            pre: Arc::clone(&pre),
            post: Arc::clone(&post),
        };

        let config = BatchConfig::new(files, dir.path().join("out"), "<c:0>_out.<old>")
            .with_steps(vec![Box::new(step)]);
        let mut runner = BatchRunner::new(config, 2).unwrap();
        runner.compute().unwrap();
        runner.wait_for_finished();

        assert_eq!(pre.load(Ordering::SeqCst), 1);
        assert_eq!(*post.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = BatchConfig::new(vec![], dir.path(), "<c:0>");
        assert!(matches!(
            BatchRunner::new(config, 1),
            Err(BatchError::EmptyFileList)
        ));
    }

    #[test]
    fn test_duplicate_inputs_write_once() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let a = dir.path().join("a.png");
        write_image(&a, 8, 8);

        let config = BatchConfig::new(vec![a.clone(), a.clone()], &out, "<c:0>.<old>")
            .with_steps(half_then_rotate());
        let recorder = Arc::new(Recorder::default());
        let mut runner = BatchRunner::new(config, 2)
            .unwrap()
            .with_observer(recorder.clone());
        runner.compute().unwrap();
        runner.wait_for_finished();

        assert_eq!(runner.num_processed(), 2);
        assert_eq!(runner.num_failures(), 1);
        assert_eq!(
            runner.current_results(),
            &[ItemStatus::Succeeded, ItemStatus::Failed]
        );
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
        assert_eq!(image::image_dimensions(out.join("a.png")).unwrap(), (4, 4));
        assert_eq!(*recorder.progress.lock().unwrap(), vec![1, 2]);

        let duplicate = LogEvent::DuplicateOutput {
            output: out.join("a.png"),
            first_input: a,
        };
        assert!(runner.log().contains(&duplicate.to_string()));
    }
}
