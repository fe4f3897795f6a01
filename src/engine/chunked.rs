use std::ops::ControlFlow;

/// 分批处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub chunks: usize,
    pub items: usize,
    pub stopped_early: bool,
}

/// 分批处理，批次之间让出执行权
///
/// `process` 返回 `ControlFlow::Break` 时立即停止。
pub async fn run_chunked<T, F>(items: &[T], chunk_size: usize, mut process: F) -> ChunkReport
where
    F: FnMut(&[T]) -> ControlFlow<()>,
{
    let mut report = ChunkReport::default();

    for (index, chunk) in items.chunks(chunk_size.max(1)).enumerate() {
        if index > 0 {
            tokio::task::yield_now().await;
        }

        report.chunks += 1;
        report.items += chunk.len();
        if process(chunk).is_break() {
            report.stopped_early = true;
            break;
        }
    }

    report
}
