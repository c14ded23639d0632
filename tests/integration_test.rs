use kyuyo::config::{CollisionPolicy, Config};
use kyuyo::driver::{self, Documents, ReportRequest, Selection};
use kyuyo::errors;
use kyuyo::fonts::SelectedFont;
use kyuyo::information;
use kyuyo::input::Workbook;
use kyuyo::record::YearMonth;
use kyuyo::render::PdfRenderer;
use kyuyo::repository::RecordRepository;
use rust_decimal::Decimal;
use rust_xlsxwriter::{ExcelDateTime, Format};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn init() {
    let _ = pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

struct Pay {
    date: (u16, u8, u8),
    id: u32,
    name: &'static str,
    total: f64,
    dependents: u32,
    transfer: &'static str,
}

/// A payroll sheet the way the payroll office keeps it: one header row,
/// native dates, numbers mostly as numbers, some amounts typed as text.
fn write_payroll(path: &Path, rows: &[Pay]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let date_format = Format::new().set_num_format("yyyy/mm/dd");
    let sheet = workbook.add_worksheet().set_name("給与").unwrap();
    let headings = [
        "支給日", "社員番号", "氏名", "総支給額", "標準報酬月額", "健康保険", "厚生年金",
        "健康保険料", "厚生年金", "社会保険料控除額", "社会保険料控除後", "扶養親族等の数",
        "源泉所得税", "", "", "", "健康保険(会社)", "厚生年金(会社)", "賃料", "駐車場",
        "振込金額",
    ];
    for (col, h) in headings.iter().enumerate() {
        sheet.write_string(0, col as u16, *h).unwrap();
    }
    let mut row = 1;
    for pay in rows {
        if pay.name.is_empty() {
            row += 1;
            continue;
        }
        let (y, m, day) = pay.date;
        let date = ExcelDateTime::from_ymd(y, m, day).unwrap();
        sheet.write_datetime_with_format(row, 0, &date, &date_format).unwrap();
        sheet.write_number(row, 1, pay.id).unwrap();
        sheet.write_string(row, 2, pay.name).unwrap();
        sheet.write_number(row, 3, pay.total).unwrap();
        sheet.write_number(row, 11, pay.dependents).unwrap();
        sheet.write_number(row, 16, 15432.5).unwrap();
        sheet.write_string(row, 20, pay.transfer).unwrap();
        row += 1;
    }
    workbook.save(path).unwrap();
}

fn pay(
    date: (u16, u8, u8),
    id: u32,
    name: &'static str,
    total: f64,
    transfer: &'static str,
) -> Pay {
    Pay {
        date,
        id,
        name,
        total,
        dependents: 1,
        transfer,
    }
}

fn blank() -> Pay {
    pay((2025, 1, 1), 0, "", 0.0, "")
}

fn sample(dir: &Path) -> PathBuf {
    let path = dir.join("payroll.xlsx");
    write_payroll(
        &path,
        &[
            pay((2025, 3, 25), 101, "山田太郎", 300000.0, "¥250,000"),
            pay((2025, 3, 25), 102, "佐藤花子", 280000.0, "235,500"),
            blank(),
            pay((2025, 4, 25), 101, "山田太郎", 310000.0, "258,000"),
            pay((2025, 4, 25), 102, "佐藤花子", 280000.0, "235,500"),
            pay((2025, 4, 30), 102, "佐藤花子", 1.0, "1"),
            pay((2025, 4, 25), 103, "鈴木一郎", 250000.0, "不明"),
        ],
    );
    path
}

fn load(path: &Path) -> RecordRepository {
    let config = Config::default();
    let mut repo = RecordRepository::new(config.schema.clone());
    let n = repo
        .load(&Workbook::new(path, config.schema.sheet()))
        .unwrap();
    assert_eq!(n, 6);
    repo
}

#[test]
fn test_queries() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let repo = load(&sample(dir.path()));
    assert_eq!(
        repo.identities().into_iter().collect::<Vec<_>>(),
        ["佐藤花子", "山田太郎", "鈴木一郎"]
    );
    assert_eq!(repo.periods(), [ym(2025, 3), ym(2025, 4)]);

    let yamada = repo.by_identity("山田太郎");
    assert_eq!(yamada.len(), 2);
    assert_eq!(yamada[0].text("employee_id"), Some("101"));
    assert_eq!(yamada[0].money("transfer_amount"), Some(d("250000")));
    assert_eq!(yamada[1].row(), 5);
    assert_eq!(repo.aggregate("山田太郎"), Some(d("610000")));

    let sato = repo.find("佐藤花子", ym(2025, 4)).unwrap();
    assert_eq!(sato.money("total_pay"), Some(d("280000")));
    assert_eq!(repo.by_identity("佐藤花子").len(), 3);

    let suzuki = repo.find("鈴木一郎", ym(2025, 4)).unwrap();
    assert_eq!(suzuki.money("transfer_amount"), None);
    assert_eq!(suzuki.count("dependents"), Some(1));
    assert_eq!(suzuki.money("health_insurance_company"), Some(d("15432.5")));

    assert_eq!(repo.find("鈴木一郎", ym(2025, 3)), None);
    assert_eq!(repo.aggregate("田中"), None);

    let stats = information::statistics(&repo);
    assert_eq!(stats.identities, 3);
    assert_eq!(stats.records, 6);
    assert_eq!(stats.periods, 2);
}

#[test]
fn test_idempotent_load() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = sample(dir.path());
    let a = load(&path);
    let b = load(&path);
    assert_eq!(a.records(), b.records());
    assert_eq!(a.periods(), b.periods());
    assert_eq!(a.aggregate("佐藤花子"), b.aggregate("佐藤花子"));
}

#[test]
fn test_missing_source() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let mut repo = RecordRepository::new(Config::default().schema);
    let e = repo
        .load(&Workbook::new(dir.path().join("nope.xlsx"), None))
        .unwrap_err();
    assert!(errors::is_source_unavailable(&*e));
    assert!(repo.is_empty());
}

#[test]
fn test_batch() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let repo = load(&sample(dir.path()));
    let out = dir.path().join("output");
    let config = Config::default();
    let renderer = PdfRenderer::new(SelectedFont::Builtin);
    let request = ReportRequest {
        identity: Selection::All,
        period: Selection::Only(ym(2025, 4)),
        out_dir: out.clone(),
    };
    let tally = driver::run(&repo, &request, Documents::Both, &renderer, &config.report).unwrap();
    assert_eq!(tally.succeeded, 3 + 1);
    assert!(tally.is_clean());
    for name in [
        "給与明細_山田太郎_2025年4月.pdf",
        "給与明細_佐藤花子_2025年4月.pdf",
        "給与明細_鈴木一郎_2025年4月.pdf",
        "振込金額一覧_2025年4月.pdf",
    ] {
        let bytes = fs::read(out.join(name)).unwrap();
        assert!(bytes.starts_with(b"%PDF"), "{name}");
    }

    // Same run again: still exactly one file per document.
    let again = driver::run(&repo, &request, Documents::Both, &renderer, &config.report).unwrap();
    assert_eq!(again, tally);
    assert_eq!(fs::read_dir(&out).unwrap().count(), 4);
}

#[test]
fn test_batch_with_suffixes() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let repo = load(&sample(dir.path()));
    let out = dir.path().join("output");
    let mut config = Config::default();
    config.report.collision = CollisionPolicy::Suffix;
    let renderer = PdfRenderer::new(SelectedFont::Builtin);
    let request = ReportRequest {
        identity: Selection::Only("山田太郎".to_owned()),
        period: Selection::All,
        out_dir: out.clone(),
    };
    for _ in 0..2 {
        let tally =
            driver::run(&repo, &request, Documents::Payslips, &renderer, &config.report).unwrap();
        assert_eq!(tally.succeeded, 2);
    }
    assert!(out.join("給与明細_山田太郎_2025年3月.pdf").exists());
    assert!(out.join("給与明細_山田太郎_2025年3月_1.pdf").exists());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 4);
}
