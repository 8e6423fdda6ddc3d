//! Long-form usage text printed by `--man`.

pub const MANUAL: &str = r#"Usage:
  named-process-exporter [options] --config.path matchers.yml

or

  named-process-exporter [options] --procnames name1,...,nameN [--namemapping k1,v1,...,kN,vN]

A matcher config file is the recommended way to select processes. The
--procnames/--namemapping flags are a compact alternative and cannot be
combined with --config.path.

Process groups and children:

  With --children (default true) a process that is not selected by any
  matcher is counted against the nearest ancestor that is. Resource usage of
  helper subprocesses is therefore added to their parent's group unless the
  subprocess resolves to a group of its own.

Threads:

  With --threads (default true) each group also reports thread counts and
  CPU time per thread name, taken from /proc/<pid>/task/<tid>/stat. Use
  --threads=false to drop these series when thread names are unbounded.

Command-line selection (--procnames/--namemapping):

  Only processes whose name appears in --procnames are reported. The name is
  the second field of /proc/<pid>/stat, which the kernel truncates to 15
  characters.

  --namemapping pairs a process name with a regex applied to the space-joined
  command line. The first non-empty capture group is appended to the name
  after a colon:

    --namemapping "python2,([^/]+)\.py,java,-jar\s+([^/]+).jar"

  reports "python2 /opt/app/worker.py" as python2:worker and
  "java -jar bar.jar" as java:bar. A mapped process whose command line
  does not match is not reported, and neither is one matched by a pattern
  without a capture group.

Config file selection (--config.path):

  The file extension selects the format: .json, .toml, otherwise YAML.

    process_names:
      - name: "{{.Comm}}"
        comm:
          - bash
      - name: "{{.ExeBase}}:{{.Matches.Cfg}}"
        exe:
          - /usr/sbin/nginx
        cmdline:
          - -c\s+(?P<Cfg>\S+)

  Rules are tried in order and the first match wins. Within a rule every
  configured matcher must match. Available template fields are .Comm,
  .ExeBase, .ExeFull and .Matches.<capture name>; the default template is
  {{.ExeBase}}.

One-shot mode:

  --once-to-stdout-delay 5s runs one baseline pass, waits the full delay,
  prints a second pass to stdout and exits without binding a port. Counter
  deltas are only meaningful in the second pass.
"#;
