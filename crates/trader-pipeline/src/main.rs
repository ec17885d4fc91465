//! 백테스트 파이프라인 CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use trader_analytics::MetricsConfig;
use trader_core::{init_logging, AppConfig, LogConfig, MarketDataSet, Timeframe};
use trader_data::{LocalObjectStorage, MarketDataReader, ReaderConfig};
use trader_pipeline::{BacktestRequest, LiveSource, PipelineRuntime, DEFAULT_LIVE_LIMIT};

#[derive(Parser)]
#[command(name = "trader-pipeline")]
#[command(about = "Backtest pipeline runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// 로그 레벨 (설정 파일 값을 덮어씀)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 백테스트를 끝까지 실행하고 리포트를 출력
    Backtest {
        /// 시장 데이터 위치 (예: "s3://market-data/btc.csv", "btc.csv")
        #[arg(long)]
        dataset: Option<String>,

        /// 종목 심볼 (쉼표로 구분, 예: "BTC,ETH")
        #[arg(long)]
        symbols: String,

        /// 초기 자본
        #[arg(long, default_value = "10000")]
        capital: Decimal,

        /// 시작일 (YYYY-MM-DD 또는 RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// 종료일 (YYYY-MM-DD 또는 RFC 3339)
        #[arg(long)]
        end: Option<String>,

        /// 선호 호가 통화
        #[arg(long)]
        quote: Option<String>,

        /// 코인 카탈로그 JSON (DB 미사용 시)
        #[arg(long)]
        coins: Option<PathBuf>,

        /// 파일 대신 거래소에서 조회할 거래쌍 (예: "BTC/USDT")
        #[arg(long)]
        live: Option<String>,

        /// 라이브 조회 캔들 주기
        #[arg(long, default_value = "1d")]
        timeframe: Timeframe,

        /// 라이브 조회 캔들 수
        #[arg(long, default_value_t = DEFAULT_LIVE_LIMIT)]
        limit: u32,

        /// 시뮬레이터 파라미터 (JSON)
        #[arg(long)]
        params: Option<String>,
    },

    /// 시장 데이터 파일을 읽고 요약을 출력
    Inspect {
        /// 시장 데이터 위치
        #[arg(long)]
        dataset: String,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },
}

fn parse_date(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("날짜 형식 오류: {raw}"))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("날짜 형식 오류: {raw}"))
}

fn parse_optional_date(raw: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    raw.map(parse_date).transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (없어도 무시)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("설정 로드 실패: {}", cli.config.display()))?;

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(log_config).map_err(|e| anyhow!("로깅 초기화 실패: {e}"))?;

    tracing::info!(config = %cli.config.display(), "trader-pipeline 시작");

    match cli.command {
        Commands::Backtest {
            dataset,
            symbols,
            capital,
            start,
            end,
            quote,
            coins,
            live,
            timeframe,
            limit,
            params,
        } => {
            let universe: Vec<String> = symbols
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();

            let dataset = match (dataset, &live) {
                (Some(location), _) => MarketDataSet::new(location),
                (None, Some(_)) => MarketDataSet::default(),
                (None, None) => bail!("--dataset 또는 --live 중 하나가 필요합니다"),
            }
            .with_universe(universe);

            let mut request = BacktestRequest::new(dataset, capital)
                .with_date_range(
                    parse_optional_date(start.as_deref())?,
                    parse_optional_date(end.as_deref())?,
                )
                .with_metrics(MetricsConfig::from(&config.metrics));
            if let Some(quote) = quote {
                request = request.with_preferred_quote(quote);
            }
            if let Some(symbol) = live {
                request = request.with_live_source(LiveSource {
                    symbol,
                    timeframe,
                    limit,
                });
            }
            if let Some(params) = params {
                let value: serde_json::Value =
                    serde_json::from_str(&params).context("--params JSON 파싱 실패")?;
                request = request.with_parameters(value);
            }

            let runtime = PipelineRuntime::connect(&config, coins.as_deref()).await?;
            runtime.start();

            let result = runtime.run_to_completion(request).await;
            runtime.shutdown().await;
            let pipeline = result?;

            println!("{}", serde_json::to_string_pretty(&pipeline)?);
            match runtime.orchestrator().report(pipeline.id).await? {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => bail!(
                    "파이프라인 {} 가 {} 상태로 종료: {}",
                    pipeline.id,
                    pipeline.status,
                    pipeline.failure_reason.as_deref().unwrap_or("-")
                ),
            }
        }
        Commands::Inspect {
            dataset,
            start,
            end,
        } => {
            let storage = Arc::new(LocalObjectStorage::from_config(&config.storage));
            let reader = MarketDataReader::new(storage, ReaderConfig::from(&config.storage));
            let data = reader
                .read_market_data(
                    &MarketDataSet::new(dataset),
                    parse_optional_date(start.as_deref())?,
                    parse_optional_date(end.as_deref())?,
                )
                .await?;

            println!("source:       {}", data.source);
            println!("records:      {}", data.record_count);
            println!("skipped rows: {}", data.skipped_rows);
            match &data.date_range {
                Some(range) => println!("date range:   {} .. {}", range.start, range.end),
                None => println!("date range:   -"),
            }
        }
    }

    Ok(())
}
