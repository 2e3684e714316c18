//! Apply/reverse runs against a generated project in a temp directory.

use std::fs;
use std::path::Path;

use speculate2::speculate;
use vercel_prep::catalogue::Transformation;
use vercel_prep::console::Console;
use vercel_prep::engine::Engine;
use vercel_prep::history::HistoryLog;
use vercel_prep::models::{HistoryEntry, Policy, Workspace};
use vercel_prep::runner::RecordingRunner;
use vercel_prep::Error;

const SETTINGS: &str = include_str!("fixtures/settings.py");
const URLS: &str = include_str!("fixtures/urls.py");
const WSGI: &str = include_str!("fixtures/wsgi.py");

const FROZEN: &str = "Django==4.2.11\npsycopg2==2.9.9\npython-dotenv==1.0.1\n";

/// Helper to lay out a freshly generated project under `root`.
fn create_project(root: &Path) {
    let project = root.join("mysite");
    fs::create_dir_all(&project).expect("Failed to create project dir");
    fs::write(project.join("settings.py"), SETTINGS).expect("Failed to write settings");
    fs::write(project.join("urls.py"), URLS).expect("Failed to write urls");
    fs::write(project.join("wsgi.py"), WSGI).expect("Failed to write wsgi");
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("Failed to read file")
}

fn normalized(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn count_assignments(text: &str, expected: &str) -> usize {
    text.lines().filter(|line| line.trim() == expected).count()
}

fn tags(entries: &[HistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.tag().unwrap_or_default().to_string())
        .collect()
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        create_project(dir.path());
        let runner = RecordingRunner::with_output(FROZEN);
        let policy = Policy::default();
    }

    describe "resolve" {
        it "detects the project module from the file tree" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant())
                .expect("Failed to resolve");
            assert_eq!(engine.workspace().project(), "mysite");
            assert_eq!(engine.workspace().settings(), dir.path().join("mysite/settings.py"));
        }

        it "ignores hidden directories and virtualenvs" {
            for skipped in [".cache/aaa", "venv/aaa"] {
                let nested = dir.path().join(skipped);
                fs::create_dir_all(&nested).unwrap();
                fs::write(nested.join("settings.py"), "").unwrap();
                fs::write(nested.join("wsgi.py"), "").unwrap();
            }
            let ws = Workspace::resolve(dir.path(), None).expect("Failed to resolve");
            assert_eq!(ws.project(), "mysite");
        }

        it "uses the configured project name verbatim" {
            let policy = Policy::from_yaml("project_name: backend/site\n").unwrap();
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant())
                .expect("Failed to resolve");
            assert_eq!(engine.workspace().entry_point(), "backend/site/wsgi.py");
        }

        it "fails when no project exists" {
            let empty = tempfile::tempdir().unwrap();
            let err = Engine::resolve(empty.path(), &policy, &runner, Console::instant())
                .err()
                .expect("resolve should fail");
            assert!(matches!(err, Error::ProjectNotFound { .. }));
            assert!(err.is_precondition());
        }
    }

    describe "plan" {
        it "runs every group in declared order by default" {
            let plan = Engine::plan(&policy);
            assert_eq!(plan.len(), 15);
            assert_eq!(plan.first(), Some(&Transformation::DebugFlag));
            assert_eq!(plan.last(), Some(&Transformation::PlatformDescriptor));
        }

        it "keeps only the always on steps when every group is disabled" {
            let policy = Policy::from_yaml(
                "set_debug_false: false\nconfigure_static_files: false\nconfigure_database: false\ngenerate_requirements: false\n",
            ).unwrap();
            assert_eq!(
                Engine::plan(&policy),
                vec![
                    Transformation::AllowedHosts,
                    Transformation::CsrfTrustedOrigins,
                    Transformation::EntryPointAlias,
                    Transformation::ManifestDependencyRewrite,
                    Transformation::PlatformDescriptor,
                ]
            );
        }
    }

    describe "apply" {
        it "logs one entry per applied reversible transformation in order" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            let report = engine.apply(&policy).expect("apply failed");

            assert_eq!(report.applied.len(), 15);
            assert!(report.unchanged.is_empty());
            assert_eq!(report.logged.len(), 14);

            let expected: Vec<String> = report
                .applied
                .iter()
                .filter(|t| t.is_reversible())
                .map(|t| t.id().to_string())
                .collect();
            let on_disk = engine.history().entries().expect("log missing");
            assert_eq!(tags(&on_disk), expected);
            assert_eq!(on_disk, report.logged);
        }

        it "writes log lines in the timestamped shape" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            engine.apply(&policy).expect("apply failed");

            let log = read(&dir.path().join("deployment_history.log"));
            let first = log.lines().next().expect("empty log");
            let (timestamp, description) = first.split_once(": ").expect("no separator");
            assert!(chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").is_ok());
            assert_eq!(description, "Set DEBUG to False [debug-flag]");
        }

        it "prepares every target file" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            engine.apply(&policy).expect("apply failed");

            let settings = read(&dir.path().join("mysite/settings.py"));
            assert!(settings.contains("DEBUG = False"));
            assert!(settings.contains("ALLOWED_HOSTS = ['.vercel.app']"));
            assert!(settings.contains("os.getenv('DATABASE_HOST')"));
            assert!(read(&dir.path().join("mysite/wsgi.py")).contains("app = application"));
            assert!(read(&dir.path().join("requirements.txt")).contains("psycopg2-binary==2.9.9"));
            assert!(dir.path().join(".env").exists());
            assert!(dir.path().join("vercel.json").exists());
            assert_eq!(
                runner.calls(),
                vec![
                    "python manage.py collectstatic --noinput",
                    "pip install whitenoise",
                    "pip freeze",
                ]
            );
        }

        it "does not log guarded steps that found nothing to do" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            engine.apply(&policy).expect("apply failed");
            let second = engine.apply(&policy).expect("second apply failed");

            for guarded in [
                Transformation::StaticFileConfig,
                Transformation::StaticMediaSettings,
                Transformation::UrlStaticMediaWiring,
                Transformation::OsImport,
                Transformation::DotenvLoading,
                Transformation::EnvFileBootstrap,
                Transformation::CsrfTrustedOrigins,
                Transformation::EntryPointAlias,
            ] {
                assert!(second.unchanged.contains(&guarded), "{guarded} ran twice");
            }
            let settings = read(&dir.path().join("mysite/settings.py"));
            assert_eq!(settings.matches("MEDIA_URL =").count(), 1);
            assert_eq!(settings.matches("CSRF_TRUSTED_ORIGINS =").count(), 1);
        }

        it "leaves settings the project already had out of the log" {
            let production = format!(
                "import os\nfrom dotenv import load_dotenv\n\nload_dotenv()\n\n{}API_KEY = os.getenv('API_KEY')\n",
                SETTINGS.replace("DEBUG = True", "DEBUG = False")
            );
            let settings = dir.path().join("mysite/settings.py");
            fs::write(&settings, &production).unwrap();

            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            let report = engine.apply(&policy).expect("apply failed");
            for untouched in [
                Transformation::DebugFlag,
                Transformation::OsImport,
                Transformation::DotenvLoading,
            ] {
                assert!(report.unchanged.contains(&untouched), "{untouched} was applied");
            }

            engine.reverse().expect("reverse failed");
            let restored = read(&settings);
            assert_eq!(count_assignments(&restored, "DEBUG = False"), 1);
            assert!(restored.contains("load_dotenv()"));
            assert_eq!(normalized(&restored), normalized(&production));
        }

        it "stops at the first I/O failure and keeps earlier changes" {
            fs::remove_file(dir.path().join("mysite/wsgi.py")).unwrap();
            let policy = Policy {
                project_name: Some("mysite".into()),
                ..Policy::default()
            };
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            let err = engine.apply(&policy).unwrap_err();
            assert!(matches!(err, Error::Io { .. }));

            let entries = engine.history().entries().expect("log missing");
            assert_eq!(entries.last().and_then(|e| e.tag()), Some("csrf-trusted-origins"));
            assert!(!dir.path().join("vercel.json").exists());
        }
    }

    describe "reverse" {
        it "restores the project and deletes the log" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            let applied = engine.apply(&policy).expect("apply failed");
            let report = engine.reverse().expect("reverse failed");

            let mut expected: Vec<Transformation> = applied
                .applied
                .into_iter()
                .filter(Transformation::is_reversible)
                .collect();
            expected.reverse();
            assert_eq!(report.reversed, expected);
            assert!(report.skipped.is_empty());

            assert_eq!(normalized(&read(&dir.path().join("mysite/settings.py"))), normalized(SETTINGS));
            assert_eq!(normalized(&read(&dir.path().join("mysite/urls.py"))), normalized(URLS));
            assert_eq!(normalized(&read(&dir.path().join("mysite/wsgi.py"))), normalized(WSGI));
            for generated in [".env", "vercel.json", "requirements.txt", "deployment_history.log"] {
                assert!(!dir.path().join(generated).exists(), "{generated} left behind");
            }
            assert!(runner.calls().contains(&"pip uninstall -y whitenoise".to_string()));
        }

        it "reports nothing to reverse without touching files" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            let err = engine.reverse().unwrap_err();
            assert!(matches!(err, Error::NothingToReverse { .. }));
            assert!(err.is_precondition());
            assert_eq!(read(&dir.path().join("mysite/settings.py")), SETTINGS);
            assert!(runner.calls().is_empty());
        }

        it "reverses known entries around unknown and malformed ones" {
            let settings = dir.path().join("mysite/settings.py");
            fs::write(
                &settings,
                SETTINGS.replace(
                    "    'django.middleware.security.SecurityMiddleware',\n",
                    "    'django.middleware.security.SecurityMiddleware',\n    'whitenoise.middleware.WhiteNoiseMiddleware',\n",
                ),
            )
            .unwrap();
            fs::write(
                dir.path().join("deployment_history.log"),
                "2024-01-01 10:00:00: Deployed to the moon\n\
                 2024-01-01 10:00:01: Installed Whitenoise\n\
                 garbage without a separator\n\
                 2024-01-01 10:00:02: Something from a newer version\n",
            )
            .unwrap();

            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            let report = engine.reverse().expect("reverse failed");

            assert_eq!(report.reversed, vec![Transformation::StaticServingDependency]);
            assert_eq!(report.skipped.len(), 2);
            assert_eq!(read(&settings), SETTINGS);
            assert!(!dir.path().join("deployment_history.log").exists());
        }

        it "understands untagged logs" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            engine.apply(&policy).expect("apply failed");

            let log = HistoryLog::new(dir.path().join("deployment_history.log"));
            let untagged: Vec<String> = log
                .entries()
                .unwrap()
                .iter()
                .map(|e| format!("{}: {}", e.timestamp, e.message()))
                .collect();
            let mut lines = vec!["2024-01-01 09:59:59: Removed SQLite configuration".to_string()];
            lines.extend(untagged);
            fs::write(log.path(), lines.join("\n") + "\n").unwrap();

            let report = engine.reverse().expect("reverse failed");
            assert_eq!(report.reversed.len(), 14);
            assert_eq!(report.skipped.len(), 1);
            assert_eq!(normalized(&read(&dir.path().join("mysite/settings.py"))), normalized(SETTINGS));
        }

        it "keeps the log when an inverse fails" {
            let engine = Engine::resolve(dir.path(), &policy, &runner, Console::instant()).unwrap();
            engine.apply(&policy).expect("apply failed");
            fs::remove_file(dir.path().join("mysite/wsgi.py")).unwrap();

            let err = engine.reverse().unwrap_err();
            assert!(matches!(err, Error::Io { .. }));
            assert!(engine.history().exists());
        }
    }
}
