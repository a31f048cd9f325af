//! Fake QtTest executables for integration tests
//!
//! Each fake is a POSIX shell script that answers `-functions` and `-help` like QtTest and, when run, writes
//! canned TAP and txt logs to the paths given with `-o`. They replay the three fixture projects:
//! test1 (benchmark, logging, XFAIL), test2 (QFAIL, XPASS, XFAIL followed by FAIL) and test3 (qFatal), plus
//! a few executables that crash after they already wrote records.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a fake run ends
#[derive(Debug, Clone, Copy)]
pub enum FakeExit {
    Code(i32),
    /// `kill -ABRT` on itself, like `qFatal`
    Abort,
}

/// Logs and exit of one fake run
#[derive(Debug, Clone)]
pub struct FakeRun {
    pub tap: String,
    pub txt: String,
    pub exit: FakeExit,
}

impl FakeRun {
    pub fn new(tap: &str, exit: FakeExit) -> Self {
        Self {
            tap: tap.to_string(),
            txt: String::new(),
            exit,
        }
    }

    pub fn with_txt(mut self, txt: &str) -> Self {
        self.txt = txt.to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeQtTest {
    pub name: String,
    pub slots: Vec<String>,
    /// Answer `-help` with QtTest's usage
    pub qttest_help: bool,
    pub full: FakeRun,
    pub per_slot: Vec<(String, FakeRun)>,
}

fn exit_line(exit: FakeExit) -> String {
    match exit {
        FakeExit::Code(code) => format!("exit {code}"),
        FakeExit::Abort => "kill -s ABRT $$\nexit 134".to_string(),
    }
}

fn write_logs(out: &mut String, run: &FakeRun) {
    out.push_str("if [ -n \"$tap\" ]; then\ncat > \"$tap\" <<'QTTEST_EOF'\n");
    out.push_str(&run.tap);
    out.push_str("QTTEST_EOF\nfi\n");
    out.push_str("if [ -n \"$txt\" ]; then\ncat > \"$txt\" <<'QTTEST_EOF'\n");
    out.push_str(&run.txt);
    out.push_str("QTTEST_EOF\nfi\n");
    out.push_str(&exit_line(run.exit));
    out.push('\n');
}

impl FakeQtTest {
    pub fn new(name: &str, slots: &[&str], full: FakeRun) -> Self {
        Self {
            name: name.to_string(),
            slots: slots.iter().map(|s| s.to_string()).collect(),
            qttest_help: true,
            full,
            per_slot: Vec::new(),
        }
    }

    pub fn with_slot_run(mut self, slot: &str, run: FakeRun) -> Self {
        self.per_slot.push((slot.to_string(), run));
        self
    }

    pub fn script(&self) -> String {
        let mut out = String::from("#!/bin/sh\n");

        out.push_str("case \"$1\" in\n-functions)\n");
        for slot in &self.slots {
            out.push_str(&format!("echo '{slot}()'\n"));
        }
        out.push_str("exit 0 ;;\n-help)\n");
        if self.qttest_help {
            out.push_str(&format!(
                "echo 'Usage: {} [options] [testfunction[:testdata]]...'\n",
                self.name
            ));
        }
        out.push_str("exit 0 ;;\nesac\n");

        out.push_str(
            "slot=\"\"\n\
             if [ $# -gt 0 ]; then\ncase \"$1\" in -*) ;; *) slot=\"$1\"; shift ;; esac\nfi\n\
             tap=\"\"\ntxt=\"\"\n\
             while [ $# -gt 0 ]; do\n\
             if [ \"$1\" = \"-o\" ] && [ $# -gt 1 ]; then\n\
             case \"$2\" in\n\
             -,txt) ;;\n\
             *,tap) tap=\"${2%,tap}\" ;;\n\
             *,txt) txt=\"${2%,txt}\" ;;\n\
             esac\n\
             shift 2\n\
             else\nshift\nfi\n\
             done\n",
        );

        out.push_str("echo '********* Start testing of MyTest *********'\n");
        out.push_str("case \"$slot\" in\n\"\")\n");
        write_logs(&mut out, &self.full);
        out.push_str(";;\n");
        for (slot, run) in &self.per_slot {
            out.push_str(&format!("{slot})\n"));
            write_logs(&mut out, run);
            out.push_str(";;\n");
        }
        out.push_str("*)\necho \"Unknown test function: $slot\" >&2\nexit 1 ;;\nesac\n");
        out
    }

    /// Writes the script to `dir/<name>` and waits until it can be executed.
    pub fn install(&self, dir: &Path) -> PathBuf {
        let path = dir.join(&self.name);
        fs::write(&path, self.script()).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        wait_until_executable(&path);
        path
    }
}

/// Another test thread may still hold the script open for writing in a forked child ("Text file busy").
fn wait_until_executable(path: &Path) {
    for _ in 0..100 {
        match std::process::Command::new(path).arg("-functions").output() {
            Err(e) if e.raw_os_error() == Some(26) => std::thread::sleep(Duration::from_millis(10)),
            _ => return,
        }
    }
}

/// A shell script printing `stdout` and exiting with `code`.
pub fn install_tool(dir: &Path, name: &str, stdout: &str, code: i32) -> PathBuf {
    let path = dir.join(name);
    let script = format!("#!/bin/sh\ncat <<'TOOL_EOF'\n{stdout}\nTOOL_EOF\nexit {code}\n");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    wait_until_executable(&path);
    path
}

/// A fake ldd that reports QtTest linkage only for the listed executables.
pub fn install_ldd(dir: &Path, linking: &[&Path]) -> PathBuf {
    let path = dir.join("fake-ldd");
    let mut script = String::from("#!/bin/sh\ncase \"$1\" in\n");
    for exe in linking {
        script.push_str(&format!(
            "\"{}\") echo '\tlibQt6Test.so.6 => /usr/lib/libQt6Test.so.6 (0x00007f)' ;;\n",
            exe.display()
        ));
    }
    script.push_str("*) echo '\tlibc.so.6 => /lib/libc.so.6 (0x00007f)' ;;\nesac\nexit 0\n");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    wait_until_executable(&path);
    path
}

/// A fake ctest listing `executables` as tests.
pub fn install_ctest(dir: &Path, executables: &[&Path]) -> PathBuf {
    let tests: Vec<String> = executables
        .iter()
        .map(|exe| {
            let name = exe.file_name().unwrap().to_string_lossy();
            format!(r#"{{"name":"{name}","command":["{}"]}}"#, exe.display())
        })
        .collect();
    let json = format!(
        r#"{{"kind":"ctestInfo","version":{{"major":1,"minor":0}},"tests":[{}]}}"#,
        tests.join(",")
    );
    install_tool(dir, "fake-ctest", &json, 0)
}

pub const TEST1_TAP: &str = "\
TAP version 13
# MyTest
ok 1 - initTestCase()
ok 2 - testA()
ok 3 - testB()
ok 4 - testC()
not ok 5 - testXFAIL() # TODO 'false' returned FALSE. (To see it fail)
  ---
  at: MyTest::testXFAIL() (/src/test1.cpp:30)
  file: /src/test1.cpp
  line: 30
  ...
ok 6 - testXFAIL()
ok 7 - cleanupTestCase()
1..7
# tests 7
# pass 6
# fail 0
";

pub const TEST1_TXT: &str = "\
********* Start testing of MyTest *********
Config: Using QtTest library 6.5.0, Qt 6.5.0
PASS   : MyTest::initTestCase()
PASS   : MyTest::testA()
RESULT : MyTest::testA():
     0.0000083 msecs per iteration (total: 70, iterations: 8388608)
PASS   : MyTest::testB()
QDEBUG : MyTest::testC() MyTest::testC()
PASS   : MyTest::testC()
XFAIL  : MyTest::testXFAIL() 'false' returned FALSE. (To see it fail)
   Loc: [/src/test1.cpp(30)]
PASS   : MyTest::testXFAIL()
PASS   : MyTest::cleanupTestCase()
Totals: 6 passed, 0 failed, 0 skipped, 0 blacklisted, 102ms
********* Finished testing of MyTest *********
";

pub const TEST2_TAP: &str = "\
TAP version 13
# MyTest
ok 1 - initTestCase()
ok 2 - testD()
ok 3 - testE()
not ok 4 - testF()
  ---
  type: QFAIL
  message: failed
  at: MyTest::testF() (/src/test2.cpp:15)
  file: /src/test2.cpp
  line: 15
  ...
ok 5 - testXPASS() # TODO 'true' returned TRUE unexpectedly. (To be fixed)
not ok 6 - testMixXFAILWithFAIL() # TODO 'false' returned FALSE. (To be fixed)
  ---
  at: MyTest::testMixXFAILWithFAIL() (/src/test2.cpp:21)
  file: /src/test2.cpp
  line: 21
  ...
not ok 7 - testMixXFAILWithFAIL()
  ---
  type: QVERIFY
  message: 'false' returned FALSE. ()
  at: MyTest::testMixXFAILWithFAIL() (/src/test2.cpp:22)
  file: /src/test2.cpp
  line: 22
  ...
ok 8 - cleanupTestCase()
1..8
# tests 8
# pass 5
# fail 3
";

pub const TEST2_TESTD_TAP: &str = "\
TAP version 13
# MyTest
ok 1 - initTestCase()
ok 2 - testD()
ok 3 - cleanupTestCase()
1..3
";

pub const TEST2_TESTF_TAP: &str = "\
TAP version 13
# MyTest
ok 1 - initTestCase()
not ok 2 - testF()
  ---
  type: QFAIL
  message: failed
  at: MyTest::testF() (/src/test2.cpp:15)
  file: /src/test2.cpp
  line: 15
  ...
ok 3 - cleanupTestCase()
1..3
";

pub const TEST3_TAP: &str = "\
TAP version 13
# MyTest
ok 1 - initTestCase()
not ok 2 - testAbortsEverythig()
  ---
  type: QFATAL
  message: Received a fatal error.
  at: MyTest::testAbortsEverythig() (Unknown file:0)
  file: Unknown file
  line: 0
  ...
";

pub fn test1() -> FakeQtTest {
    FakeQtTest::new(
        "test1",
        &["testA", "testB", "testC", "testXFAIL"],
        FakeRun::new(TEST1_TAP, FakeExit::Code(0)).with_txt(TEST1_TXT),
    )
}

pub fn test2() -> FakeQtTest {
    FakeQtTest::new(
        "test2",
        &["testD", "testE", "testF", "testXPASS", "testMixXFAILWithFAIL"],
        FakeRun::new(TEST2_TAP, FakeExit::Code(3)),
    )
    .with_slot_run("testD", FakeRun::new(TEST2_TESTD_TAP, FakeExit::Code(0)))
    .with_slot_run("testF", FakeRun::new(TEST2_TESTF_TAP, FakeExit::Code(1)))
}

pub fn test3() -> FakeQtTest {
    FakeQtTest::new(
        "test3",
        &["testAbortsEverythig", "testH", "testI"],
        FakeRun::new(TEST3_TAP, FakeExit::Abort),
    )
}

/// Crashes inside testXFAIL, after the expected failure was logged
pub const XFAIL_THEN_CRASH_TAP: &str = "\
TAP version 13
# MyTest
ok 1 - initTestCase()
ok 2 - testB()
not ok 3 - testXFAIL() # TODO 'false' returned FALSE. (To see it fail)
  ---
  at: MyTest::testXFAIL() (/src/test5.cpp:30)
  file: /src/test5.cpp
  line: 30
  ...
";

/// Crashes in the second row of testRows
pub const DATA_ROW_CRASH_TAP: &str = "\
TAP version 13
# MyTest
ok 1 - initTestCase()
ok 2 - testRows(row1)
";

/// `qFatal` inside initTestCase
pub const INIT_FATAL_TAP: &str = "\
TAP version 13
# MyTest
not ok 1 - initTestCase()
  ---
  type: QFATAL
  message: Received a fatal error.
  at: MyTest::initTestCase() (/src/test4.cpp:9)
  file: /src/test4.cpp
  line: 9
  ...
";

pub fn xfail_then_crash() -> FakeQtTest {
    FakeQtTest::new(
        "test5",
        &["testB", "testXFAIL", "testD"],
        FakeRun::new(XFAIL_THEN_CRASH_TAP, FakeExit::Abort),
    )
}

pub fn data_row_crash() -> FakeQtTest {
    FakeQtTest::new(
        "test6",
        &["testRows", "testNext"],
        FakeRun::new(DATA_ROW_CRASH_TAP, FakeExit::Abort),
    )
}

pub fn init_fatal() -> FakeQtTest {
    FakeQtTest::new("test4", &["testA", "testB"], FakeRun::new(INIT_FATAL_TAP, FakeExit::Abort))
}
