#[cfg(test)]
mod class_tests {
    use pretty_assertions::assert_eq;

    use rox::error::Diagnostics;
    use rox::session::{Mode, Session, Status};

    fn run(source: &str) -> (Status, String, Vec<String>) {
        let mut session = Session::new(Vec::new(), Diagnostics::default());
        let status = session.run(source, Mode::Program);
        let output = String::from_utf8(session.output().clone()).unwrap();

        (status, output, session.reporter().messages())
    }

    fn output_of(source: &str) -> Vec<String> {
        let (status, output, errors) = run(source);
        assert_eq!(errors, Vec::<String>::new());
        assert_eq!(status, Status::Ok);
        output.lines().map(str::to_string).collect()
    }

    fn runtime_error(source: &str) -> String {
        let (status, _, errors) = run(source);
        assert_eq!(status, Status::RuntimeError);
        assert_eq!(errors.len(), 1);
        errors[0].clone()
    }

    #[test]
    fn test_classes_01_fields_and_methods() {
        assert_eq!(
            output_of(
                "class Point {
                   init(x, y) { this.x = x; this.y = y; }
                   sum() { return this.x + this.y; }
                 }
                 var p = Point(1, 2);
                 print p.sum();
                 p.x = 10;
                 print p.sum();
                 print p.x;"
            ),
            vec!["3", "12", "10"]
        );
    }

    #[test]
    fn test_classes_02_fields_shadow_methods() {
        assert_eq!(
            output_of(
                "class A { m() { return \"method\"; } }
                 var a = A();
                 a.m = \"field\";
                 print a.m;"
            ),
            vec!["field"]
        );
    }

    #[test]
    fn test_classes_03_bound_methods_remember_their_instance() {
        assert_eq!(
            output_of(
                "class Person {
                   init(name) { this.name = name; }
                   greet() { return \"hi \" + this.name; }
                 }
                 var bob = Person(\"bob\");
                 var greet = bob.greet;
                 bob.name = \"robert\";
                 print greet();
                 print Person(\"ann\").greet();"
            ),
            vec!["hi robert", "hi ann"]
        );
    }

    #[test]
    fn test_classes_04_super_calls_reach_the_parent() {
        assert_eq!(
            output_of(
                "class Base { greet() { return \"base\"; } }
                 class Derived < Base { greet() { return \"derived \" + super.greet(); } }
                 print Derived().greet();"
            ),
            vec!["derived base"]
        );
    }

    #[test]
    fn test_classes_05_inherited_methods_and_initializers() {
        assert_eq!(
            output_of(
                "class A {
                   init(v) { this.v = v; }
                   show() { print \"A \" + this.v; }
                 }
                 class B < A {
                   init(v) { super.init(v * 2); }
                 }
                 class C < B {}
                 B(1).show();
                 C(5).show();"
            ),
            vec!["A 2", "A 10"]
        );
    }

    #[test]
    fn test_classes_06_super_is_lexical() {
        assert_eq!(
            output_of(
                "class A { m() { return \"A\"; } }
                 class B < A { m() { return \"B\"; } test() { return super.m(); } }
                 class C < B { m() { return \"C\"; } }
                 print C().test();"
            ),
            vec!["A"]
        );
    }

    #[test]
    fn test_classes_07_initializer_returns_instance() {
        assert_eq!(
            output_of(
                "class Box {
                   init() { this.n = 1; return; this.n = 2; }
                 }
                 var b = Box();
                 print b.n;
                 print b.init() == b;
                 print b.n;"
            ),
            vec!["1", "true", "1"]
        );
    }

    #[test]
    fn test_classes_08_class_arity_comes_from_init() {
        assert_eq!(
            runtime_error("class P { init(a, b) {} }\nP(1);"),
            "[line 2] Runtime error: Expected 2 arguments but got 1."
        );
        assert_eq!(
            runtime_error("class Q {} Q(1);"),
            "[line 1] Runtime error: Expected 0 arguments but got 1."
        );
    }

    #[test]
    fn test_classes_09_property_errors() {
        assert_eq!(
            runtime_error("class A {} print A().missing;"),
            "[line 1] Runtime error: Undefined property 'missing'."
        );
        assert_eq!(
            runtime_error("var x = 1; print x.y;"),
            "[line 1] Runtime error: Only instances have properties."
        );
        assert_eq!(
            runtime_error("var x = \"s\"; x.y = 1;"),
            "[line 1] Runtime error: Only instances have fields."
        );
        assert_eq!(
            runtime_error("var x = 1;\nclass B < x {}"),
            "[line 2] Runtime error: Superclass must be a class."
        );
    }

    #[test]
    fn test_classes_10_methods_can_name_their_class() {
        assert_eq!(
            output_of(
                "class Node {
                   init(next) { this.next = next; }
                   grow() { return Node(this); }
                 }
                 var n = Node(nil).grow().grow();
                 print n.next.next.next;"
            ),
            vec!["nil"]
        );
    }

    #[test]
    fn test_classes_11_instance_equality_is_identity() {
        assert_eq!(
            output_of(
                "class A {} var a = A(); var b = a;
                 print a == b; print a == A(); print A == A;"
            ),
            vec!["true", "false", "true"]
        );
    }

    #[test]
    fn test_classes_12_arrays() {
        assert_eq!(
            output_of(
                "var a = Array(3);
                 print a;
                 print a.length;
                 print a.set(0, \"x\");
                 a.set(2, 7);
                 print a.get(0);
                 print a;
                 print Array(\"solo\");
                 print Array(0);"
            ),
            vec!["[nil, nil, nil]", "3", "x", "x", "[x, nil, 7]", "[solo]", "[]"]
        );
    }

    #[test]
    fn test_classes_19_arrays_containing_each_other_print() {
        assert_eq!(
            output_of(
                "var a = Array(1);
                 var b = Array(1);
                 a.set(0, b);
                 b.set(0, a);
                 print a;
                 print b;
                 var c = Array(2);
                 c.set(0, c);
                 c.set(1, Array(\"x\"));
                 print c;
                 var d = Array(\"y\");
                 var e = Array(2);
                 e.set(0, d);
                 e.set(1, d);
                 print e;"
            ),
            vec!["[[[...]]]", "[[[...]]]", "[[...], [x]]", "[[y], [y]]"]
        );
    }

    #[test]
    fn test_classes_13_array_indices_outside_the_array_read_nil() {
        assert_eq!(
            output_of(
                "var a = Array(2);
                 a.set(0, 1);
                 print a.get(5);
                 print a.get(-1);
                 print a.get(0.5);
                 print a.get(\"0\");
                 print a.set(9, 1);
                 print a;"
            ),
            vec!["nil", "nil", "nil", "nil", "nil", "[1, nil]"]
        );
    }

    #[test]
    fn test_classes_14_array_errors() {
        assert_eq!(
            runtime_error("var a = Array(1); a.size = 2;"),
            "[line 1] Runtime error: Can't add properties to arrays."
        );
        assert_eq!(
            runtime_error("Array(1).push;"),
            "[line 1] Runtime error: Undefined property 'push'."
        );
        assert_eq!(
            runtime_error("Array(-1);"),
            "[line 1] Runtime error: Array size must be a non-negative whole number."
        );
        assert_eq!(
            runtime_error("Array(1.5);"),
            "[line 1] Runtime error: Array size must be a non-negative whole number."
        );
    }

    #[test]
    fn test_classes_15_array_methods_are_values() {
        assert_eq!(
            output_of(
                "var a = Array(1);
                 var set = a.set;
                 set(0, \"via value\");
                 print a.get(0);
                 print set;"
            ),
            vec!["via value", "<native fn set>"]
        );
    }

    #[test]
    fn test_classes_16_natives() {
        assert_eq!(
            output_of(
                "var start = clock();
                 print sleep(1);
                 print clock() >= start;
                 print clock() > 1000000000;"
            ),
            vec!["true", "true", "true"]
        );
        assert_eq!(
            runtime_error("sleep(-5);"),
            "[line 1] Runtime error: sleep() expects a non-negative number of milliseconds."
        );
        assert_eq!(
            runtime_error("sleep(\"soon\");"),
            "[line 1] Runtime error: sleep() expects a non-negative number of milliseconds."
        );
    }

    #[test]
    fn test_classes_17_clear_writes_to_the_output() {
        let (status, output, _) = run("print clear();");

        assert_eq!(status, Status::Ok);
        assert_eq!(output, "\x1B[2J\x1B[1;1Htrue\n");
    }

    #[test]
    fn test_classes_18_method_calls_release_their_frames() {
        let mut session = Session::new(Vec::new(), Diagnostics::default());
        assert_eq!(
            session.run(
                "class Counter { init() { this.n = 0; } inc() { this.n = this.n + 1; } }
                 var c = Counter();",
                Mode::Program
            ),
            Status::Ok
        );

        let before = session.interpreter().live_frames();

        assert_eq!(
            session.run(
                "for (var i = 0; i < 50; i = i + 1) c.inc(); print c.n;",
                Mode::Program
            ),
            Status::Ok
        );

        assert_eq!(String::from_utf8(session.output().clone()).unwrap(), "50\n");
        assert_eq!(session.interpreter().live_frames(), before);
    }

    #[test]
    fn test_classes_20_bound_methods_held_in_variables_release_their_frames() {
        let mut session = Session::new(Vec::new(), Diagnostics::default());
        assert_eq!(
            session.run(
                "class Reader { init() { this.v = 7; } get() { return this.v; } }
                 var o = Reader();
                 var m;",
                Mode::Program
            ),
            Status::Ok
        );

        let before = session.interpreter().live_frames();

        // One statement: nothing runs between iterations but the loop itself.
        assert_eq!(
            session.run(
                "var i = 0; while (i < 500) { var local = o.get; local(); i = i + 1; }",
                Mode::Program
            ),
            Status::Ok
        );
        assert_eq!(session.interpreter().live_frames(), before);

        assert_eq!(
            session.run(
                "var j = 0; while (j < 500) { m = o.get; m(); j = j + 1; } print m();",
                Mode::Program
            ),
            Status::Ok
        );
        // `m` still holds the last bound method.
        assert_eq!(session.interpreter().live_frames(), before + 1);

        assert_eq!(session.run("m = nil;", Mode::Program), Status::Ok);
        assert_eq!(session.interpreter().live_frames(), before);
        assert_eq!(String::from_utf8(session.output().clone()).unwrap(), "7\n");
    }
}
